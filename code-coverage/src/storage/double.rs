// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::*;
use crate::error::NotFoundError;

#[derive(Debug, Default)]
pub struct ObjectStoreDouble {
    pub objects: Mutex<BTreeMap<String, (Vec<u8>, ObjectMetadata)>>,
    pub writes: Mutex<Vec<String>>,
    /// Names whose `get` fails with an error other than "not found".
    pub broken: BTreeSet<String>,
    pub fail_list: bool,
}

impl Clone for ObjectStoreDouble {
    fn clone(&self) -> Self {
        Self {
            objects: Mutex::new(self.objects.lock().unwrap().clone()),
            writes: Mutex::new(self.written()),
            broken: self.broken.clone(),
            fail_list: self.fail_list,
        }
    }
}

impl ObjectStoreDouble {
    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.objects
            .get_mut()
            .unwrap()
            .insert(name.into(), (data, ObjectMetadata::zstd_json()));
    }

    pub fn object(&self, name: &str) -> Option<(Vec<u8>, ObjectMetadata)> {
        self.objects.lock().unwrap().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    /// Names passed to `put`, in call order.
    pub fn written(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl IObjectStore for ObjectStoreDouble {
    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(name))
    }

    async fn put(
        &self,
        name: &str,
        data: Vec<u8>,
        metadata: &ObjectMetadata,
    ) -> Result<StoredObject> {
        self.writes.lock().unwrap().push(name.to_owned());
        self.objects
            .lock()
            .unwrap()
            .insert(name.to_owned(), (data, metadata.clone()));

        Ok(StoredObject {
            bucket: "double".to_owned(),
            name: name.to_owned(),
            content_type: Some(metadata.content_type.clone()),
            content_encoding: Some(metadata.content_encoding.clone()),
        })
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        if self.broken.contains(name) {
            bail!("connection reset while reading {}", name);
        }

        match self.object(name) {
            Some((data, _)) => Ok(data),
            None => Err(NotFoundError::new(name).into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        if self.fail_list {
            bail!("listing {} failed", prefix);
        }

        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }
}
