use std::process::ExitCode;

use sheets_refresh::{run_full_refresh, setup_info_logger, RefreshConfig};

use crate::console::{print_error_message, print_success_message, print_warn_message};

mod console;

fn main() -> ExitCode {
    setup_info_logger();

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            print_error_message(&format!("Could not start the async runtime: {}", e));
            return ExitCode::FAILURE;
        }
    };

    let config = RefreshConfig::from_env();

    match runtime.block_on(run_full_refresh(&config)) {
        Ok(summary) => {
            print_success_message(&format!(
                "Refreshed {} with {} rows ({} replaced)",
                summary.table, summary.rows_loaded, summary.rows_deleted
            ));
            ExitCode::SUCCESS
        }
        Err(e) => {
            print_error_message(&format!("Full refresh failed: {}", e));
            if e.data_loss() {
                print_warn_message(&format!(
                    "Table {} is empty until the next successful run",
                    config.target_table
                ));
            }
            ExitCode::FAILURE
        }
    }
}
