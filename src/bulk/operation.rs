use serde::Deserialize;

use crate::{
    bson::{Bson, Document},
    bson_util::first_key,
    bulk::{
        models::{DeleteStatement, UpdateOrReplace, UpdateStatement},
        BatchType,
        BulkOperation,
    },
    error::{ErrorKind, Result},
    options::UpdateModifications,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateModel {
    filter: Option<Document>,
    update: UpdateModifications,
    upsert: Option<bool>,
    array_filters: Option<Vec<Document>>,
    collation: Option<Document>,
    hint: Option<Bson>,
}

#[derive(Debug, Deserialize)]
struct ReplaceModel {
    filter: Option<Document>,
    replacement: Document,
    upsert: Option<bool>,
    collation: Option<Document>,
    hint: Option<Bson>,
}

#[derive(Debug, Deserialize)]
struct DeleteModel {
    filter: Option<Document>,
    collation: Option<Document>,
    hint: Option<Bson>,
}

fn invalid_operation(message: impl Into<String>) -> crate::error::Error {
    ErrorKind::InvalidOperation {
        message: message.into(),
    }
    .into()
}

fn operation_body(name: &str, value: Bson) -> Result<Document> {
    match value {
        Bson::Document(body) => Ok(body),
        other => Err(invalid_operation(format!(
            "{name} must be given a document, got {other}"
        ))),
    }
}

impl BulkOperation {
    /// Adds an operation given in one of the shapes of the CRUD API or of the write commands:
    ///
    /// - `{ insertOne: { document } }` or `{ insertOne: <document> }`
    /// - `{ insertMany: [<document>, ...] }`
    /// - `{ updateOne | updateMany: { filter, update, upsert?, arrayFilters?, collation?, hint? } }`
    /// - `{ replaceOne: { filter, replacement, upsert?, collation?, hint? } }`
    /// - `{ deleteOne | deleteMany: { filter, collation?, hint? } }`
    /// - `{ removeOne | removeMany: { q, ... } }`
    ///
    /// Update and delete operations that already hold a `q` field are taken as update or delete
    /// statements and passed through with `multi` or `limit` set from the operation name.
    pub fn raw(&mut self, operation: impl Into<Bson>) -> Result<&mut Self> {
        let mut operation = match operation.into() {
            Bson::Document(operation) => operation,
            Bson::Array(_) => {
                return Err(invalid_operation("operation passed in cannot be an Array"))
            }
            other => {
                return Err(invalid_operation(format!(
                    "operation must be a document, got {other}"
                )))
            }
        };
        let name = first_key(&operation)
            .ok_or_else(|| invalid_operation("operation must not be empty"))?
            .to_string();
        let value = operation.remove(&name).unwrap_or(Bson::Null);

        match name.as_str() {
            "insertOne" => {
                let body = operation_body(&name, value)?;
                let document = match body.get("document") {
                    Some(Bson::Document(document)) => document.clone(),
                    _ => body,
                };
                self.insert(document)
            }
            "insertMany" => {
                let documents = match value {
                    Bson::Array(documents) => documents,
                    other => {
                        return Err(invalid_operation(format!(
                            "insertMany must be given an array, got {other}"
                        )))
                    }
                };
                for document in documents {
                    let body = operation_body(&name, document)?;
                    let document = match body.get("document") {
                        Some(Bson::Document(document)) => document.clone(),
                        _ => body,
                    };
                    self.insert(document)?;
                }
                Ok(self)
            }
            "updateOne" | "updateMany" => {
                let multi = name == "updateMany";
                let mut body = operation_body(&name, value)?;
                if body.contains_key("q") {
                    self.check_array_filters(body.contains_key("arrayFilters"))?;
                    body.insert("multi", multi);
                    return self.add_operation(BatchType::Update, body, None);
                }

                let model: UpdateModel = bson::from_document(body)?;
                let filter = model.filter.ok_or(ErrorKind::MissingSelector)?;
                let mut statement = UpdateStatement::new(
                    filter,
                    UpdateOrReplace::UpdateModifications(model.update),
                    multi,
                    model.upsert.unwrap_or(false),
                )?;
                statement.array_filters = model.array_filters;
                statement.collation = model.collation;
                statement.hint = model.hint;
                self.add_update(statement)
            }
            "replaceOne" => {
                let mut body = operation_body(&name, value)?;
                if body.contains_key("q") {
                    body.insert("multi", false);
                    return self.add_operation(BatchType::Update, body, None);
                }

                let model: ReplaceModel = bson::from_document(body)?;
                let filter = model.filter.ok_or(ErrorKind::MissingSelector)?;
                let mut statement = UpdateStatement::new(
                    filter,
                    UpdateOrReplace::Replacement(model.replacement),
                    false,
                    model.upsert.unwrap_or(false),
                )?;
                statement.collation = model.collation;
                statement.hint = model.hint;
                self.add_update(statement)
            }
            "deleteOne" | "deleteMany" | "removeOne" | "removeMany" => {
                let limit = if name.ends_with("One") { 1 } else { 0 };
                let mut body = operation_body(&name, value)?;
                if body.contains_key("q") {
                    if limit == 1 || !body.contains_key("limit") {
                        body.insert("limit", limit);
                    }
                    return self.add_operation(BatchType::Remove, body, None);
                }

                let model: DeleteModel = bson::from_document(body)?;
                let filter = model.filter.ok_or(ErrorKind::MissingSelector)?;
                let mut statement = DeleteStatement::new(filter, limit);
                statement.collation = model.collation;
                statement.hint = model.hint;
                self.add_delete(statement)
            }
            _ => Err(ErrorKind::UnsupportedOperation { name }.into()),
        }
    }
}
