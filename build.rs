// Copyright © 2024 Bassline. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Build script: refuses toolchains older than the declared minimum.

fn main() {
    let min_version = "1.74";

    match version_check::is_min_version(min_version) {
        Some(true) => {}
        _ => {
            eprintln!(
                "Bassline requires at least Rust {}.",
                min_version
            );
            std::process::exit(1);
        }
    }

    println!("cargo:rerun-if-changed=build.rs");
}
