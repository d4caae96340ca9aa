//!
//! sce-auth admin tool
//! -------------------
//! Operator commands against a configured store: list users and roles, register,
//! verify, sign in and change roles. Settings come from `SCE_AUTH_CONFIG`
//! (default `sce_auth.json`); missing files fall back to defaults.

use std::env;

use anyhow::{anyhow, Result};
use tracing::info;

use sce_auth::{AuthSettings, Role, SessionManager};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} users\n  {program} roles\n  {program} register <username> <email> <password>\n  {program} verify <token>\n  {program} login <email> <password>\n  {program} logout\n  {program} whoami\n  {program} set-role <user-id> <ROLE>\n\nEnvironment:\n  SCE_AUTH_CONFIG   settings file (default: sce_auth.json)\n  RUST_LOG          log filter (default: info)"
    );
}

fn arg<'a>(args: &'a [String], i: usize, name: &str) -> Result<&'a str> {
    args.get(i).map(|s| s.as_str()).ok_or_else(|| anyhow!("missing <{}>", name))
}

#[tokio::main]
async fn main() -> Result<()> {
    sce_auth::logging::init("info");

    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "sce-auth".to_string());
    let Some(cmd) = args.get(1).map(|s| s.as_str()) else {
        print_usage(&program);
        return Ok(());
    };

    let config_path = env::var("SCE_AUTH_CONFIG").unwrap_or_else(|_| "sce_auth.json".to_string());
    let settings = AuthSettings::load_or_default(&config_path);
    info!(
        target: "sce",
        "sce-auth starting: config='{}', backend={:?}, dir='{}'",
        config_path, settings.storage.backend, settings.storage.dir.display()
    );
    let sm = SessionManager::open(settings)?;

    match cmd {
        "users" => {
            for u in sm.get_all_users() {
                println!("{}\t{}\t{}\t{}\tverified={}", u.id, u.username, u.email, u.role, u.is_email_verified);
            }
        }
        "roles" => {
            for r in sm.role_catalog().list() {
                let perms: Vec<&str> = r.permissions.iter().map(|p| p.as_str()).collect();
                println!("{}\t{}\t{}", r.id, r.name, perms.join(","));
            }
        }
        "register" => {
            let reg = sm.register(arg(&args, 2, "username")?, arg(&args, 3, "email")?, arg(&args, 4, "password")?).await?;
            println!("registered {} as {}", reg.user.id, reg.user.role);
            println!("verify at {}", reg.verification_path());
        }
        "verify" => {
            if sm.verify_email(arg(&args, 2, "token")?).await {
                println!("email verified");
            } else {
                return Err(anyhow!("unknown or already used token"));
            }
        }
        "login" => {
            let outcome = sm.login_outcome(arg(&args, 2, "email")?, arg(&args, 3, "password")?).await;
            if !outcome.success {
                return Err(anyhow!(outcome.message.unwrap_or_else(|| "login failed".to_string())));
            }
            if let Some(u) = sm.current_user() {
                println!("signed in as {} ({})", u.email, u.role);
            }
        }
        "logout" => {
            sm.logout();
            println!("signed out");
        }
        "whoami" => match sm.current_user() {
            Some(u) => println!("{}\t{}\t{}", u.id, u.email, u.role),
            None => println!("anonymous"),
        },
        "set-role" => {
            let id = arg(&args, 2, "user-id")?;
            let name = arg(&args, 3, "ROLE")?;
            let role = Role::parse(name).ok_or_else(|| anyhow!("unknown role '{}'", name))?;
            if !sm.update_user_role(id, role) {
                return Err(anyhow!("no user with id '{}'", id));
            }
            println!("{} is now {}", id, role);
        }
        "-h" | "--help" | "help" => print_usage(&program),
        other => {
            print_usage(&program);
            return Err(anyhow!("unknown command '{}'", other));
        }
    }
    Ok(())
}
