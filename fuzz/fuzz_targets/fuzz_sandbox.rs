// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fuzz target for path canonicalization and sandbox validation

#![no_main]

use arbitrary::Arbitrary;
use arkfs_core::{path, Sandbox};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    path: &'a str,
    allowed: Vec<&'a str>,
}

fuzz_target!(|input: Input<'_>| {
    let clean = path::canonicalize(input.path);
    assert_eq!(path::canonicalize(&clean), clean);

    let sandbox = Sandbox::restricted(input.allowed.iter().copied());
    match sandbox.validate(input.path) {
        Ok(validated) => {
            assert_eq!(validated, clean);
            assert!(input
                .allowed
                .iter()
                .any(|dir| path::is_within(&clean, &path::canonicalize(dir))));
        }
        Err(e) => assert!(e.is_access_denied()),
    }

    assert_eq!(path::join(&clean, "."), clean);
});
