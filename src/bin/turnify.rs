// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Stand-alone proxy binary.
//!
//!  Build it with `cargo build --release --bin turnify`
//!  The binary honours TURNIFY_CONFIG_FILE when set and always reads the
//!  environment on top of it.

use std::env;
use std::error::Error;
use turnify::{error_fmt, info_fmt, Turnify};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let mut loader = Turnify::loader().with_env_vars();
    if let Ok(path) = env::var("TURNIFY_CONFIG_FILE") {
        println!("Using configuration from {path}");
        loader = loader.with_config_file(path);
    }

    let proxy = match loader.build() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to build proxy: {e}");
            return Err(e.into());
        }
    };

    match proxy.start().await {
        Ok(()) => {
            info_fmt!("Turnify", "Proxy server stopped gracefully");
            Ok(())
        }
        Err(e) => {
            error_fmt!("Turnify", "Proxy server failed: {}", e);
            Err(e.into())
        }
    }
}
