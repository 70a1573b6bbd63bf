use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use crate::{
    bson::{doc, Document},
    cmap::{Command, StreamDescription},
    error::Result,
    BoxFuture,
    Client,
    CommandExecutor,
};

type Handler = dyn Fn(&Command) -> Result<Document> + Send + Sync;
type Delay = dyn Fn(&Command) -> Option<Duration> + Send + Sync;

/// A scripted [`CommandExecutor`]. Every command is recorded; replies come from a handler when
/// one is set, and otherwise from a queue that falls back to `{ ok: 1 }` once empty.
#[derive(Clone)]
pub(crate) struct MockExecutor {
    description: Arc<Mutex<StreamDescription>>,
    replies: Arc<Mutex<VecDeque<Result<Document>>>>,
    handler: Option<Arc<Handler>>,
    delay: Option<Arc<Delay>>,
    commands: Arc<Mutex<Vec<Command>>>,
    arrivals: Arc<Mutex<Vec<String>>>,
}

impl MockExecutor {
    /// An executor describing a MongoDB 8.0 replica set primary.
    pub(crate) fn new() -> Self {
        Self {
            description: Arc::new(Mutex::new(StreamDescription::with_wire_version(25))),
            replies: Default::default(),
            handler: None,
            delay: None,
            commands: Default::default(),
            arrivals: Default::default(),
        }
    }

    pub(crate) fn with_description(self, description: StreamDescription) -> Self {
        *self.description.lock().unwrap() = description;
        self
    }

    pub(crate) fn with_handler(
        mut self,
        handler: impl Fn(&Command) -> Result<Document> + Send + Sync + 'static,
    ) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Holds back the reply to each command for the returned duration.
    pub(crate) fn with_delay(
        mut self,
        delay: impl Fn(&Command) -> Option<Duration> + Send + Sync + 'static,
    ) -> Self {
        self.delay = Some(Arc::new(delay));
        self
    }

    pub(crate) fn reply(&self, reply: Document) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(reply));
        self
    }

    pub(crate) fn fail(&self, error: impl Into<crate::error::Error>) -> &Self {
        self.replies.lock().unwrap().push_back(Err(error.into()));
        self
    }

    /// Every command sent so far, in order.
    pub(crate) fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    /// The commands sent so far with the given name.
    pub(crate) fn commands_named(&self, name: &str) -> Vec<Command> {
        self.commands()
            .into_iter()
            .filter(|command| command.name() == name)
            .collect()
    }

    /// The names of the commands whose replies have been delivered, in delivery order.
    pub(crate) fn arrivals(&self) -> Vec<String> {
        self.arrivals.lock().unwrap().clone()
    }

    pub(crate) fn client(&self) -> Client {
        Client::new(self.clone())
    }
}

impl CommandExecutor for MockExecutor {
    fn stream_description(&self) -> Result<StreamDescription> {
        Ok(self.description.lock().unwrap().clone())
    }

    fn execute<'a>(&'a self, command: Command) -> BoxFuture<'a, Result<Document>> {
        self.commands.lock().unwrap().push(command.clone());
        let reply = match self.handler {
            Some(ref handler) => handler(&command),
            None => self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(doc! { "ok": 1 })),
        };
        let delay = self.delay.as_ref().and_then(|delay| delay(&command));
        let name = command.name().to_string();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.arrivals.lock().unwrap().push(name);
            reply
        })
    }
}

/// The number of statements in a legacy write command.
pub(crate) fn statement_count(command: &Command) -> usize {
    ["documents", "updates", "deletes"]
        .iter()
        .find_map(|field| command.body().get_array(*field).ok())
        .map_or(0, |statements| statements.len())
}
