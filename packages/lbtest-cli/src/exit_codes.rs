/// All tests ran and no errors were counted.
pub const SUCCESS: i32 = 0;

/// The suite completed but at least one error was counted.
pub const TEST_FAILURE: i32 = 1;

/// A broken descriptor, missing reference data or an unusable environment
/// stopped the suite.
pub const FATAL_ERROR: i32 = 3;
