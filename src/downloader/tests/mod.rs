use super::test_helpers::*;
use super::*;
use crate::types::{Event, WorkStatus};
use std::time::Duration;
