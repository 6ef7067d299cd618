mod cli;

use bizdesk_core::error::ApiError;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{e:#}"); // pretty anyhow chain
        if let Some(api_err) = e.downcast_ref::<ApiError>()
            && api_err.requires_login()
        {
            eprintln!("Run 'bizdesk login' to sign in again.");
        }
        std::process::exit(1);
    }
}
