use crate::{
    app::{AppResult, ParamsError},
    notification::NotificationHandler,
};
use database::ShoppingListDatabase;
use model::{
    add_item, comment_item, delete_item, summary::Summary, toggle_item, NewItem, ShoppingItem,
    ShoppingList,
};
use serde_json::Value as JsonValue;
use std::{convert::TryFrom, sync::Arc};

/// Every mutation loads the whole list, changes it in memory, saves it back and
/// then pushes the saved list to live viewers.
pub struct ListItemController {
    db: Arc<ShoppingListDatabase>,
    notifications: Arc<NotificationHandler>,
}

impl ListItemController {
    pub fn new(
        list_item_db: Arc<ShoppingListDatabase>,
        notifications: Arc<NotificationHandler>,
    ) -> Self {
        Self {
            db: list_item_db,
            notifications,
        }
    }

    pub async fn get_items(&self) -> AppResult<ShoppingList> {
        Ok(self.db.load().await)
    }

    pub async fn get_summary(&self) -> AppResult<Summary> {
        let list = self.db.load().await;
        Ok(Summary::of(&list))
    }

    pub async fn add_item(&self, body: JsonValue) -> AppResult<ShoppingItem> {
        let params = add_item::Params::try_from(body)?;

        let mut list = self.db.load().await;
        let item = list
            .add_item(NewItem::from(params), crate::current_timestamp())?
            .clone();

        self.save_and_publish(&list).await?;

        info!(
            "'{}' added {} x '{}' with id '{}'",
            item.last_editor, item.quantity, item.name, item.id
        );

        Ok(item)
    }

    pub async fn toggle_item(
        &self,
        id: &str,
        body: JsonValue,
    ) -> AppResult<toggle_item::MethodResult> {
        use toggle_item::{MethodResult, Params};
        let params = Params::try_from(body)?;

        let mut list = self.db.load().await;
        let item = list
            .toggle_item(id, params.username.as_deref(), crate::current_timestamp())?
            .clone();

        self.save_and_publish(&list).await?;

        info!(
            "'{}' set '{}' to {:?}",
            item.last_editor, item.name, item.status
        );

        Ok(MethodResult::new(item))
    }

    pub async fn comment_item(
        &self,
        id: &str,
        body: JsonValue,
    ) -> AppResult<comment_item::MethodResult> {
        use comment_item::{MethodResult, Params};
        let params = Params::try_from(body)?;

        let mut list = self.db.load().await;
        let item = list
            .comment_item(
                id,
                &params.comment,
                params.username.as_deref(),
                crate::current_timestamp(),
            )?
            .clone();

        self.save_and_publish(&list).await?;

        info!(
            "'{}' commented on '{}' ({} earlier comments)",
            item.last_editor,
            item.name,
            item.comment_history.len()
        );

        Ok(MethodResult::new(item))
    }

    /// Always succeeds; deleting an unknown id changes nothing and saves nothing
    pub async fn delete_item(&self, id: &str) -> AppResult<delete_item::MethodResult> {
        let mut list = self.db.load().await;

        if list.delete_item(id) {
            self.save_and_publish(&list).await?;
            info!("deleted list item with id '{}'", id);
        } else {
            debug!("no list item with id '{}' to delete", id);
        }

        Ok(delete_item::MethodResult::new())
    }

    async fn save_and_publish(&self, list: &ShoppingList) -> AppResult<()> {
        self.db.save(list).await?;
        self.notifications.publish_update(list).await;
        Ok(())
    }
}

impl ParamsError for add_item::InvalidParams {}
impl ParamsError for toggle_item::InvalidParams {}
impl ParamsError for comment_item::InvalidParams {}
