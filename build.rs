//! Build script for civic-reports
//!
//! `sqlx::migrate!` embeds the migrations at compile time, so new or edited
//! migration files must trigger a rebuild.

fn main() {
    println!("cargo:rerun-if-changed=migrations");
}
