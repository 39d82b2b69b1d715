use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // Any argument at all gets the help text
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Secrets (PBS_JWT_SECRET, PBS_STRIPE_SECRET_KEY, PBS_STRIPE_WEBHOOK_SECRET) are deliberately left out
    const DISPLAY_ENVS: [&str; 16] = [
        "RUST_LOG",
        "PBS_HOST",
        "PBS_PORT",
        "PBS_DATABASE_URL",
        "PBS_TOKEN_LIFETIME_HOURS",
        "PBS_ADMIN_EMAILS",
        "PBS_USE_X_FORWARDED_FOR",
        "PBS_USE_FORWARDED",
        "PBS_SERVICE_FEE_CENTS",
        "PBS_DEPOSIT_THRESHOLD_CENTS",
        "PBS_DEPOSIT_RATE_BPS",
        "PBS_CURRENCY",
        "PBS_UNPAID_BID_TIMEOUT",
        "PBS_STRIPE_API_BASE",
        "PBS_STRIPE_SIGNATURE_TOLERANCE",
        "PBS_STRIPE_SIGNATURE_CHECKS",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
