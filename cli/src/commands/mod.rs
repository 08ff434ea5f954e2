//! CLI command handlers organized by subcommand.
//!
//! | Module | Commands |
//! |--------|----------|
//! | [`convert`] | `blocks`, `full` - file to file conversion |
//! | [`live`] | `live`, `devices` - audio device streaming |

pub mod convert;
pub mod live;
pub mod utils;
