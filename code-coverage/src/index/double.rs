// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::*;

#[derive(Clone, Debug, Default)]
pub enum IndexSourceDouble {
    #[default]
    Missing,
    Published(Vec<u8>),
    Unavailable,
}

#[async_trait]
impl IIndexSource for IndexSourceDouble {
    async fn fetch(&self) -> Result<Vec<u8>> {
        match self {
            IndexSourceDouble::Missing => Err(NotFoundError::new("double").into()),
            IndexSourceDouble::Published(data) => Ok(data.clone()),
            IndexSourceDouble::Unavailable => bail!("503 Service Unavailable"),
        }
    }
}
