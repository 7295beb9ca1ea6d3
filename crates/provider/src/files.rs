//! File management calls. Each takes the bearer token explicitly so the
//! caller can wrap it in a refresh-and-retry.

use std::fmt;

use panbridge_protocol::{DownloadLink, FileItem, FileList, FolderCreated, ObjectId, ProviderError};
use reqwest::multipart::Form;
use tracing::debug;

use crate::client::{ProviderClient, is_root, send};

/// Kind of a remote object, as the management endpoints name it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    File,
    Folder,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Folder => "folder",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ProviderClient {
    /// Lists the direct children of `folder_id`.
    pub async fn list_files(
        &self,
        access_token: &str,
        folder_id: &str,
    ) -> Result<Vec<FileItem>, ProviderError> {
        let request = self
            .http
            .get(self.endpoint("list_files"))
            .bearer_auth(access_token)
            .query(&[("folder_id", folder_id)]);

        let list: FileList = send(request).await?.check()?.unwrap_or_default();
        debug!(folder_id, count = list.items.len(), "listed folder");
        Ok(list.items)
    }

    /// Resolves a temporary download URL for a file.
    pub async fn download_url(
        &self,
        access_token: &str,
        file_id: &str,
    ) -> Result<String, ProviderError> {
        let request = self
            .http
            .get(self.endpoint("get_download_url"))
            .bearer_auth(access_token)
            .query(&[("file_id", file_id)]);

        let link: DownloadLink = send(request).await?.into_data()?;
        Ok(link.download_url)
    }

    /// Creates `name` under `parent_id` and returns the new folder's id.
    pub async fn create_folder(
        &self,
        access_token: &str,
        parent_id: &str,
        name: &str,
    ) -> Result<ObjectId, ProviderError> {
        let mut form = Form::new().text("name", name.to_string());
        if !is_root(parent_id) {
            form = form.text("parent_id", parent_id.to_string());
        }
        let request = self
            .http
            .post(self.endpoint("create_folder"))
            .bearer_auth(access_token)
            .multipart(form);

        let created: FolderCreated = send(request).await?.into_data()?;
        debug!(parent_id, folder_id = %created.folder_id, "folder created");
        Ok(created.folder_id)
    }

    pub async fn move_item(
        &self,
        access_token: &str,
        id: &str,
        kind: ItemKind,
        target_id: &str,
    ) -> Result<(), ProviderError> {
        self.manage(
            access_token,
            "move_item",
            id,
            kind,
            Some(("target_id", target_id)),
        )
        .await
    }

    pub async fn rename_item(
        &self,
        access_token: &str,
        id: &str,
        kind: ItemKind,
        new_name: &str,
    ) -> Result<(), ProviderError> {
        self.manage(access_token, "rename_item", id, kind, Some(("new_name", new_name)))
            .await
    }

    pub async fn delete_item(
        &self,
        access_token: &str,
        id: &str,
        kind: ItemKind,
    ) -> Result<(), ProviderError> {
        self.manage(access_token, "delete_item", id, kind, None).await
    }

    async fn manage(
        &self,
        access_token: &str,
        action: &str,
        id: &str,
        kind: ItemKind,
        extra: Option<(&str, &str)>,
    ) -> Result<(), ProviderError> {
        let mut form = Form::new()
            .text("id", id.to_string())
            .text("type", kind.as_str());
        if let Some((name, value)) = extra {
            form = form.text(name.to_string(), value.to_string());
        }
        let request = self
            .http
            .post(self.endpoint(action))
            .bearer_auth(access_token)
            .multipart(form);

        send::<serde_json::Value>(request).await?.check()?;
        debug!(action, id, kind = %kind, "item updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::mock_server::{MockResponse, MockServer};

    fn client(server: &MockServer) -> ProviderClient {
        ProviderClient::new(&ProviderConfig {
            api_base_url: server.url().to_string(),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn list_files_decodes_items() {
        let server = MockServer::start().await;
        server.route(
            "GET",
            "/list_files",
            MockResponse::json(
                200,
                r#"{"code":200,"data":{"items":[
                    {"id":1,"name":"docs","size":0,"type":"folder"},
                    {"id":"2","name":"a.txt","size":12,"type":"file","modified":"2024-03-01 10:00:00"}
                ]}}"#,
            ),
        );

        let items = client(&server).list_files("at", "0").await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_folder());
        assert_eq!(items[1].id.as_str(), "2");
        assert_eq!(items[1].size, 12);

        let req = &server.requests_to("/list_files")[0];
        assert_eq!(req.header("authorization"), Some("Bearer at"));
        assert_eq!(req.query_param("folder_id").as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn list_files_empty_folder() {
        let server = MockServer::start().await;
        server.route("GET", "/list_files", MockResponse::json(200, r#"{"code":200,"data":null}"#));
        assert!(client(&server).list_files("at", "5").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn download_url_requires_link() {
        let server = MockServer::start().await;
        server.route_once(
            "GET",
            "/get_download_url",
            MockResponse::json(200, r#"{"code":200,"data":{"download_url":"https://cdn/f/9"}}"#),
        );
        server.route(
            "GET",
            "/get_download_url",
            MockResponse::json(200, r#"{"code":200}"#),
        );
        let client = client(&server);

        assert_eq!(client.download_url("at", "9").await.unwrap(), "https://cdn/f/9");
        let err = client.download_url("at", "9").await.unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));

        let req = &server.requests_to("/get_download_url")[0];
        assert_eq!(req.query_param("file_id").as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn create_folder_omits_root_parent() {
        let server = MockServer::start().await;
        server.route(
            "POST",
            "/create_folder",
            MockResponse::json(200, r#"{"code":200,"data":{"folder_id":77}}"#),
        );
        let client = client(&server);

        let id = client.create_folder("at", "0", "new").await.unwrap();
        assert_eq!(id.as_str(), "77");
        client.create_folder("at", "12", "nested").await.unwrap();

        let reqs = server.requests_to("/create_folder");
        assert_eq!(reqs[0].form_field("name").as_deref(), Some("new"));
        assert_eq!(reqs[0].form_field("parent_id"), None);
        assert_eq!(reqs[1].form_field("parent_id").as_deref(), Some("12"));
    }

    #[tokio::test]
    async fn manage_calls_send_id_and_type() {
        let server = MockServer::start().await;
        for path in ["/move_item", "/rename_item", "/delete_item"] {
            server.route("POST", path, MockResponse::json(200, r#"{"code":200}"#));
        }
        let client = client(&server);

        client.move_item("at", "5", ItemKind::Folder, "9").await.unwrap();
        client.rename_item("at", "6", ItemKind::File, "b.txt").await.unwrap();
        client.delete_item("at", "7", ItemKind::File).await.unwrap();

        let mv = &server.requests_to("/move_item")[0];
        assert_eq!(mv.form_field("id").as_deref(), Some("5"));
        assert_eq!(mv.form_field("type").as_deref(), Some("folder"));
        assert_eq!(mv.form_field("target_id").as_deref(), Some("9"));

        let rn = &server.requests_to("/rename_item")[0];
        assert_eq!(rn.form_field("type").as_deref(), Some("file"));
        assert_eq!(rn.form_field("new_name").as_deref(), Some("b.txt"));

        let rm = &server.requests_to("/delete_item")[0];
        assert_eq!(rm.form_field("id").as_deref(), Some("7"));
        assert_eq!(rm.multipart_parts().len(), 2);
    }

    #[tokio::test]
    async fn manage_call_rejected() {
        let server = MockServer::start().await;
        server.route(
            "POST",
            "/delete_item",
            MockResponse::json(200, r#"{"code":404,"message":"item not found"}"#),
        );
        let err = client(&server)
            .delete_item("at", "1", ItemKind::File)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api { code: 404, .. }));
    }
}
