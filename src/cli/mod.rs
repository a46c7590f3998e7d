//! # CLI Module
//!
//! Command-line entry points for the `contactd` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Run the server until SIGINT or SIGTERM:
//!
//! ```bash
//! contactd serve --config contactd.yaml --port 8080 --mode pool --workers 8
//! ```
//!
//! Every flag also reads a `CONTACTD_*` environment variable
//! (`CONTACTD_PORT`, `CONTACTD_ADMIN_PASS`, ...). Flags override the file.
//!
//! ### `check-config`
//!
//! Resolve and validate a configuration, then print it with the admin
//! password masked:
//!
//! ```bash
//! contactd check-config --config contactd.yaml
//! ```

mod commands;


pub use commands::{run, run_cli, Cli, Commands, ServeArgs};
