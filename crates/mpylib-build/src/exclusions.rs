//! Modules already built into the unix MicroPython port
//!
//! micropython-lib still carries packages with these names (mostly old
//! unix-ffi implementations). Installing them would shadow the builtin
//! modules, so they are never built, neither as packages nor as module
//! directories inside other packages.

use std::collections::HashSet;

/// Output of `help('modules')` on the unix port
pub const BUILTIN_MODULES: &[&str] = &[
    "_asyncio",
    "_thread",
    "argparse",
    "array",
    "asyncio",
    "binascii",
    "btree",
    "builtins",
    "cmath",
    "collections",
    "cryptolib",
    "deflate",
    "errno",
    "ffi",
    "framebuf",
    "gc",
    "hashlib",
    "heapq",
    "io",
    "json",
    "machine",
    "math",
    "micropython",
    "mip",
    "os",
    "platform",
    "random",
    "re",
    "requests",
    "select",
    "socket",
    "ssl",
    "struct",
    "sys",
    "termios",
    "time",
    "uasyncio",
    "uctypes",
    "websocket",
];

/// The builtin module names as an owned set
pub fn builtin_exclusions() -> HashSet<String> {
    BUILTIN_MODULES.iter().map(|name| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_set_is_closed() {
        let set = builtin_exclusions();
        assert_eq!(set.len(), BUILTIN_MODULES.len());
        assert!(set.contains("asyncio"));
        assert!(set.contains("requests"));
        assert!(!set.contains("copy"));
    }

    #[test]
    fn test_builtin_list_sorted() {
        let mut sorted = BUILTIN_MODULES.to_vec();
        sorted.sort();
        assert_eq!(sorted, BUILTIN_MODULES);
    }
}
