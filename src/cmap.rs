mod command;
mod stream_description;

pub use self::{
    command::Command,
    stream_description::{ServerType, StreamDescription},
};
pub(crate) use command::CommandResponse;
