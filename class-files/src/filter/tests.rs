// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::Result;

use super::LocationFilter;

#[test]
fn test_default() {
    let filter = LocationFilter::default();

    // All included.
    assert!(filter.is_included("/classes/com/foo/Bar.class"));
    assert!(filter.is_included("/lib/app.jar@com/foo/Bar.class"));
    assert!(filter.is_included("Bar.class"));
}

#[test]
fn test_empty() -> Result<()> {
    let text = include_str!("test-data/empty.txt");
    let filter = LocationFilter::parse(text)?;

    // No includes means include everything.
    assert!(filter.is_included("/classes/com/foo/Bar.class"));
    assert!(filter.is_included("/lib/app.jar@com/foo/Bar.class"));

    Ok(())
}

#[test]
fn test_include_with_excludes() -> Result<()> {
    let text = include_str!("test-data/include-app.txt");
    let filter = LocationFilter::parse(text)?;

    assert!(filter.is_included("/build/classes/com/example/App.class"));
    assert!(filter.is_included("/lib/app.jar@com/example/util/Strings.class"));
    assert!(!filter.is_included("/build/classes/org/other/Lib.class"));
    assert!(!filter.is_included("/build/classes/com/example/generated/Proto.class"));
    assert!(!filter.is_included("/build/classes/com/example/AppTest.class"));

    Ok(())
}

#[test]
fn test_exclude_only() -> Result<()> {
    let text = include_str!("test-data/exclude-only.txt");
    let filter = LocationFilter::parse(text)?;

    assert!(filter.is_included("/app/lib/core.jar@com/foo/Bar.class"));
    assert!(!filter.is_included("/app/lib/vendor-json.jar@org/json/Json.class"));
    assert!(!filter.is_included("/app.war@WEB-INF/lib/vendor-x.jar@x/Y.class"));

    Ok(())
}

#[test]
fn test_exclude_needs_space() -> Result<()> {
    let text = include_str!("test-data/exclude-needs-space.txt");
    let filter = LocationFilter::parse(text)?;

    // `!missing-space.class` is treated as an include pattern, not an exclude.
    assert!(filter.is_included("/classes/A.class"));
    assert!(filter.is_included("!missing-space.class"));

    Ok(())
}

#[test]
fn test_single_star_stays_in_segment() -> Result<()> {
    let filter = LocationFilter::new(&["*.class"], &[] as &[&str])?;

    assert!(filter.is_included("Bar.class"));
    assert!(!filter.is_included("com/Bar.class"));
    assert!(!filter.is_included("app.jar@Bar.class"));

    Ok(())
}

#[test]
fn test_question_mark() -> Result<()> {
    let filter = LocationFilter::new(&["**/Bar?.class"], &[] as &[&str])?;

    assert!(filter.is_included("/x/Bar1.class"));
    assert!(!filter.is_included("/x/Bar.class"));
    assert!(!filter.is_included("/x/Bar12.class"));

    Ok(())
}

#[test]
fn test_double_star_crosses_archives() -> Result<()> {
    let filter = LocationFilter::new(&["**/Bar.class"], &["**/test/**"])?;

    assert!(filter.is_included("/classes/com/foo/Bar.class"));
    assert!(filter.is_included("/lib/app.jar@Bar.class"));
    assert!(!filter.is_included("/lib/test/app.jar@Bar.class"));

    Ok(())
}

#[test]
fn test_regex_metacharacters_are_literal() -> Result<()> {
    let filter = LocationFilter::new(&["**/Outer$Inner.class"], &[] as &[&str])?;

    assert!(filter.is_included("/classes/Outer$Inner.class"));
    assert!(!filter.is_included("/classes/OuterxInner.class"));

    Ok(())
}

#[test]
fn test_extend() -> Result<()> {
    let mut filter = LocationFilter::new(&[] as &[&str], &["**/*Test.class"])?;
    let other = LocationFilter::new(&["**/com/**"], &[] as &[&str])?;
    filter.extend(&other)?;

    assert!(filter.is_included("/classes/com/Foo.class"));
    assert!(!filter.is_included("/classes/com/FooTest.class"));
    assert!(!filter.is_included("/classes/org/Foo.class"));

    Ok(())
}
