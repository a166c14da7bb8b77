//! Print a bcrypt hash for the case study editor's admin password.
//!
//! Usage: hash-password <PASSWORD> [COST]

use bcrypt::{hash, verify, DEFAULT_COST};
use std::env;
use std::process::ExitCode;

const MIN_PASSWORD_LEN: usize = 8;

fn main() -> ExitCode {
    let mut args = env::args().skip(1);
    let Some(password) = args.next() else {
        eprintln!("Usage: hash-password <PASSWORD> [COST]");
        return ExitCode::FAILURE;
    };

    if password.len() < MIN_PASSWORD_LEN {
        eprintln!("Refusing to hash a password shorter than {MIN_PASSWORD_LEN} characters");
        return ExitCode::FAILURE;
    }

    let cost = match args.next().map(|c| c.parse::<u32>()) {
        None => DEFAULT_COST,
        Some(Ok(cost)) if (4..=31).contains(&cost) => cost,
        Some(_) => {
            eprintln!("COST must be a number between 4 and 31");
            return ExitCode::FAILURE;
        }
    };

    let hashed = match hash(&password, cost) {
        Ok(hashed) => hashed,
        Err(e) => {
            eprintln!("Error hashing password: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Catch a broken bcrypt build before the hash lands in .env
    if !verify(&password, &hashed).unwrap_or(false) {
        eprintln!("Generated hash failed verification");
        return ExitCode::FAILURE;
    }

    println!("# cost {cost}; add to .env for the admin login");
    println!("ADMIN_HASH_PASSWORD={hashed}");
    ExitCode::SUCCESS
}
