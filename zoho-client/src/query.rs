use std::path::Path;

use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    multipart::{Form, Part},
    Method,
};

use crate::error::Result;

/// How a [`Query`] is sent, decided by what it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// No form data and no files.
    Get,
    /// Form data but no files, sent url encoded.
    Post,
    /// Files, with any form data as text parts.
    Multipart,
}

impl RequestKind {
    pub fn method(&self) -> Method {
        match self {
            RequestKind::Get => Method::GET,
            RequestKind::Post | RequestKind::Multipart => Method::POST,
        }
    }
}

/// A file to upload as part of a multipart request.
#[derive(Debug, Clone)]
pub struct FilePart {
    file_name: String,
    bytes: Vec<u8>,
    mime: Option<String>,
}

impl FilePart {
    pub fn new<N, B>(file_name: N, bytes: B) -> Self
    where
        N: ToString,
        B: Into<Vec<u8>>,
    {
        Self {
            file_name: file_name.to_string(),
            bytes: bytes.into(),
            mime: None,
        }
    }

    /// Read a file from disk, named after the last component of its path.
    pub async fn from_path<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self::new(file_name, bytes))
    }

    pub fn mime<M>(mut self, mime: M) -> Self
    where
        M: ToString,
    {
        self.mime = Some(mime.to_string());
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    fn to_part(&self) -> Result<Part> {
        let part = Part::bytes(self.bytes.clone()).file_name(self.file_name.clone());

        Ok(match &self.mime {
            Some(mime) => part.mime_str(mime)?,
            None => part,
        })
    }
}

/// Everything sent to an endpoint besides the bearer header. The method is
/// never given explicitly, see [`Query::kind`].
#[derive(Debug, Clone, Default)]
pub struct Query {
    params: Vec<(String, String)>,
    headers: HeaderMap,
    data: Vec<(String, String)>,
    files: Vec<(String, FilePart)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query string parameter.
    pub fn param<K, V>(mut self, key: K, value: V) -> Self
    where
        K: ToString,
        V: ToString,
    {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a header. The `Authorization` header is always overwritten with
    /// the client's bearer token.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Add a form field to the request body.
    pub fn data<K, V>(mut self, key: K, value: V) -> Self
    where
        K: ToString,
        V: ToString,
    {
        self.data.push((key.to_string(), value.to_string()));
        self
    }

    /// Attach a file under the given form field name.
    pub fn file<N>(mut self, name: N, file: FilePart) -> Self
    where
        N: ToString,
    {
        self.files.push((name.to_string(), file));
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn kind(&self) -> RequestKind {
        if self.files.is_empty() {
            if self.data.is_empty() {
                RequestKind::Get
            } else {
                RequestKind::Post
            }
        } else {
            RequestKind::Multipart
        }
    }

    /// Build the multipart body. Forms are consumed when sent, so this is
    /// called again for every attempt.
    pub(crate) fn multipart(&self) -> Result<Form> {
        let mut form = Form::new();

        for (key, value) in &self.data {
            form = form.text(key.clone(), value.clone());
        }
        for (name, file) in &self.files {
            form = form.part(name.clone(), file.to_part()?);
        }

        Ok(form)
    }

    pub(crate) fn form(&self) -> &[(String, String)] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;

    use super::{FilePart, Query, RequestKind};

    #[test]
    fn test_empty_query_is_get() {
        let query = Query::new().param("limit", 10);

        assert_eq!(RequestKind::Get, query.kind());
        assert_eq!(Method::GET, query.kind().method());
    }

    #[test]
    fn test_data_without_files_is_post() {
        let query = Query::new().data("name", "Reports");

        assert_eq!(RequestKind::Post, query.kind());
        assert_eq!(Method::POST, query.kind().method());
    }

    #[test]
    fn test_files_are_multipart() {
        let file = FilePart::new("notes.txt", "hello");

        assert_eq!(RequestKind::Multipart, Query::new().file("content", file.clone()).kind());
        assert_eq!(
            RequestKind::Multipart,
            Query::new().data("parent_id", "abc").file("content", file).kind()
        );
    }

    #[test]
    fn test_rejects_bad_mime() {
        let query = Query::new().file("content", FilePart::new("a.bin", vec![0u8]).mime("not a mime"));

        assert!(query.multipart().is_err());
    }

    #[tokio::test]
    async fn test_file_part_from_path() {
        let dir = std::env::temp_dir().join(format!("zoho-oauth-client-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("upload.csv");
        tokio::fs::write(&path, "a,b\n1,2\n").await.unwrap();

        let file = FilePart::from_path(&path).await.unwrap();

        assert_eq!("upload.csv", file.file_name());
        assert_eq!(b"a,b\n1,2\n".to_vec(), file.bytes);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
