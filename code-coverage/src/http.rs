// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use reqwest::Response;

use crate::error::BackendError;

#[async_trait]
pub trait ResponseExt: Sized {
    /// Alternative to `Response::error_for_status()` which includes the text of
    /// the response body, as a `BackendError`.
    async fn error_for_status_with_body(self) -> Result<Self>;
}

#[async_trait]
impl ResponseExt for Response {
    async fn error_for_status_with_body(self) -> Result<Self> {
        let status = self.status();
        let is_err = status.is_client_error() || status.is_server_error();

        if is_err {
            let url = self.url().clone();
            let body = self
                .text()
                .await
                .unwrap_or_else(|_| "<could not decode response body>".to_owned());

            return Err(BackendError { url, status, body }.into());
        }

        Ok(self)
    }
}
