// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use coverage::testwise::TestDetails;
use serde::{Deserialize, Serialize};

/// JSON list of the tests seen during a run.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TestListJson {
    pub tests: Vec<TestDetails>,
}

impl TestListJson {
    pub fn deserialize(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_string_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<Vec<TestDetails>> for TestListJson {
    fn from(tests: Vec<TestDetails>) -> Self {
        Self { tests }
    }
}
