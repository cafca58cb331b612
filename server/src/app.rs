use crate::{controller::ListItemController, notification::NotificationHandler, AppSettings};
use database::{Database, DatabaseError, ShoppingListDatabase};
use hyper::StatusCode;
use model::{Action, ListError};
use serde_json::Value as JsonValue;
use std::{
    error::Error,
    fmt::{Debug, Display},
    sync::Arc,
};

pub type AppResult<T> = Result<T, AppError>;

/// A parsed API request, ready to be dispatched to a controller
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    GetItems,
    AddItem(JsonValue),
    GetSummary,
    ItemAction {
        id: String,
        action: Action,
        body: JsonValue,
    },
    DeleteItem(String),
}

impl ApiCall {
    fn name(&self) -> String {
        match self {
            ApiCall::GetItems => "get_items".to_owned(),
            ApiCall::AddItem(_) => "add_item".to_owned(),
            ApiCall::GetSummary => "get_summary".to_owned(),
            ApiCall::ItemAction { action, .. } => format!("{}_item", action),
            ApiCall::DeleteItem(_) => "delete_item".to_owned(),
        }
    }
}

pub struct App {
    list_controller: ListItemController,
    notifications: Arc<NotificationHandler>,
}

impl App {
    pub fn new(
        list_item_db: Arc<ShoppingListDatabase>,
        notifications: Arc<NotificationHandler>,
    ) -> Self {
        let list_controller = ListItemController::new(list_item_db, notifications.clone());

        Self {
            list_controller,
            notifications,
        }
    }

    pub fn from_settings(settings: &AppSettings) -> Self {
        let list_item_db = Arc::new(Database::new(settings.data_file.clone()));
        let notifications = Arc::new(NotificationHandler::new());

        Self::new(list_item_db, notifications)
    }

    /// The registry live viewers subscribe to
    pub fn notifications(&self) -> Arc<NotificationHandler> {
        self.notifications.clone()
    }

    /// Handle a single API call, returning the JSON response body
    pub async fn handle_call(&self, call: ApiCall) -> AppResult<JsonValue> {
        let timer = std::time::Instant::now();
        let name = call.name();
        trace!("handling call: {:?}", call);

        let result = match call {
            ApiCall::GetItems => self
                .list_controller
                .get_items()
                .await
                .and_then(to_json),
            ApiCall::AddItem(body) => self
                .list_controller
                .add_item(body)
                .await
                .and_then(to_json),
            ApiCall::GetSummary => self
                .list_controller
                .get_summary()
                .await
                .and_then(to_json),
            ApiCall::ItemAction {
                id,
                action: Action::Toggle,
                body,
            } => self
                .list_controller
                .toggle_item(&id, body)
                .await
                .and_then(to_json),
            ApiCall::ItemAction {
                id,
                action: Action::Comment,
                body,
            } => self
                .list_controller
                .comment_item(&id, body)
                .await
                .and_then(to_json),
            ApiCall::DeleteItem(id) => self
                .list_controller
                .delete_item(&id)
                .await
                .and_then(to_json),
        };

        debug!("handled '{}' in {:?}", name, timer.elapsed());

        if let Err(err) = &result {
            if err.status.is_server_error() {
                error!("'{}' failed: {:?}", name, err);
            }
        }

        result
    }
}

fn to_json<T>(value: T) -> AppResult<JsonValue>
where
    T: serde::Serialize,
{
    Ok(serde_json::to_value(value)?)
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub context: Option<String>,
}

impl AppError {
    fn new(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            message: message.to_owned(),
            context: None,
        }
    }

    pub fn with_context<T>(mut self, value: &T) -> Self
    where
        T: Debug,
    {
        self.context = Some(format!("{:?}", value));
        self
    }

    pub fn with_message(mut self, message: &str) -> Self {
        self.message = message.to_owned();
        self
    }

    pub fn invalid_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid request")
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found")
    }

    pub fn internal_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }

    pub fn storage_error() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "the shopping list could not be saved",
        )
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for AppError {}

impl From<DatabaseError> for AppError {
    fn from(db_error: DatabaseError) -> Self {
        AppError::storage_error().with_context(&db_error)
    }
}

impl From<ListError> for AppError {
    fn from(list_error: ListError) -> Self {
        match list_error {
            ListError::Validation(message) => AppError::invalid_request().with_message(&message),
            ListError::NotFound(id) => AppError::not_found()
                .with_message("Item not found")
                .with_context(&id),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(serde_error: serde_json::Error) -> Self {
        AppError::internal_error().with_context(&serde_error)
    }
}

pub trait ParamsError: Error {}

impl<T> From<T> for AppError
where
    T: ParamsError,
{
    fn from(err: T) -> Self {
        AppError::invalid_request()
            .with_message(&err.to_string())
            .with_context(&err)
    }
}
