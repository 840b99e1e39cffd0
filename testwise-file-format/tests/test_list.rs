// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;
use coverage::testwise::TestDetails;
use pretty_assertions::assert_eq;
use testwise_file_format::test_list::TestListJson;

fn expected_tests() -> Vec<TestDetails> {
    vec![
        TestDetails {
            external_id: "com.foo.BarTest:test1".into(),
            internal_id: "com/foo/BarTest/test1".into(),
            source_path: Some("com/foo/BarTest.java".into()),
            display_name: "test1()".into(),
            module: None,
        },
        TestDetails {
            external_id: "com.foo.BarTest:test2".into(),
            internal_id: "com/foo/BarTest/test2".into(),
            source_path: None,
            display_name: "test2()".into(),
            module: Some("core".into()),
        },
    ]
}

#[test]
fn test_test_list_format() -> Result<()> {
    let text = include_str!("files/test-list.json");
    let json = TestListJson::deserialize(text)?;
    assert_eq!(json.tests, expected_tests());

    let reencoded = TestListJson::from(expected_tests()).to_string_pretty()?;
    let value: serde_json::Value = serde_json::from_str(&reencoded)?;
    let original: serde_json::Value = serde_json::from_str(text)?;
    assert_eq!(value, original);

    Ok(())
}
