// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#[macro_use]
extern crate log;

pub mod exec;
pub mod junit;
pub mod line_coverage;
pub mod test_list;
pub mod testwise;
