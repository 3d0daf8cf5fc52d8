//!
//! taskdesk CLI
//! ------------
//! Console driver for the session core: logs in against the backend, issues
//! authenticated requests, and prints session events while watching a token
//! run down.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use taskdesk::api::{TaskDraft, TaskStatus};
use taskdesk::client::Method;
use taskdesk::config::TaskdeskConfig;
use taskdesk::guards::GuardDecision;
use taskdesk::session::{Role, SessionEvent};
use taskdesk::SessionRuntime;

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [--config <file>] login <username> <password>\n  {program} [--config <file>] logout\n  {program} [--config <file>] status\n  {program} [--config <file>] tasks [list | admin | add <title> [description] | done <id> | rm <id>]\n  {program} [--config <file>] users\n  {program} [--config <file>] request <GET|POST|PUT|PATCH|DELETE> <path> [json-body]\n  {program} [--config <file>] watch [--continue]\n\nFlags:\n  --config <file>     JSON config file (defaults apply when absent)\n  --continue          While watching, renew the session when the expiry warning fires\n  -h, --help          Show this help\n\nEnvironment:\n  TASKDESK_API_BASE_URL, TASKDESK_SESSION_FILE, TASKDESK_POLL_INTERVAL_MS,\n  TASKDESK_WARNING_WINDOW_SECS, TASKDESK_COUNTDOWN_SECS, TASKDESK_REFRESH_TIMEOUT_MS,\n  TASKDESK_REQUEST_TIMEOUT_MS, TASKDESK_OFFER_CONTINUE_ON_EXPIRY\n\nThe session persists to TASKDESK_SESSION_FILE (default .taskdesk/session.json)."
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("building log filter")?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("taskdesk");

    let mut config_path: Option<PathBuf> = None;
    let mut rest: Vec<String> = Vec::new();
    let mut i = 1usize;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => { print_usage(program); return Ok(()); }
            "--config" => {
                i += 1;
                let p = args.get(i).ok_or_else(|| anyhow!("--config requires a path"))?;
                config_path = Some(PathBuf::from(p));
            }
            other => rest.push(other.to_string()),
        }
        i += 1;
    }
    if rest.is_empty() {
        print_usage(program);
        return Err(anyhow!("missing command"));
    }

    let mut config = TaskdeskConfig::load(config_path.as_deref())?;
    if config.session_file.is_none() && env::var_os("TASKDESK_SESSION_FILE").is_none() {
        config.session_file = Some(PathBuf::from(".taskdesk").join("session.json"));
    }
    info!(target: "taskdesk", base_url = %config.base_url, session_file = ?config.session_file, "starting");
    let rt = SessionRuntime::from_config(config)?;

    let cmd = rest[0].as_str();
    let argv = &rest[1..];
    match cmd {
        "login" => {
            if rt.guard_public_only() != GuardDecision::Allow {
                println!("already signed in as {}; log out first", rt.store().role().map(|r| r.to_string()).unwrap_or_default());
                return Ok(());
            }
            let (user, pass) = match argv {
                [u, p, ..] => (u.as_str(), p.as_str()),
                _ => return Err(anyhow!("login requires <username> <password>")),
            };
            let creds = rt.auth().login(user, pass).await?;
            let home = taskdesk::guards::dashboard_for(Some(creds.role), &rt.config().routes);
            println!("signed in as {} (user id {}); home {}", creds.role, creds.user_id, home);
        }
        "logout" => {
            if rt.logout() { println!("signed out"); } else { println!("no session"); }
        }
        "status" => print_status(&rt),
        "tasks" => run_tasks(&rt, argv).await?,
        "users" => {
            ensure_allowed(&rt, Some(Role::Admin))?;
            for u in rt.users().list_mine().await? {
                println!("{:>5}  {:<30} {:<6} {} {}", u.id, u.username, u.role,
                    u.firstname.unwrap_or_default(), u.lastname.unwrap_or_default());
            }
        }
        "request" => {
            let (method, path) = match argv {
                [m, p, ..] => (parse_method(m)?, p.as_str()),
                _ => return Err(anyhow!("request requires <METHOD> <path>")),
            };
            let body = match argv.get(2) {
                Some(raw) => Some(serde_json::from_str(raw).context("json-body must be valid JSON")?),
                None => None,
            };
            let resp = rt.client().request(method, path, body).await?;
            println!("HTTP {}\n{}", resp.status, resp.body);
        }
        "watch" => {
            let renew = argv.iter().any(|a| a == "--continue");
            watch(&rt, renew).await?;
        }
        other => {
            print_usage(program);
            return Err(anyhow!("unknown command '{other}'"));
        }
    }
    Ok(())
}

fn print_status(rt: &SessionRuntime) {
    let Some(creds) = rt.store().snapshot() else {
        println!("anonymous");
        return;
    };
    println!("user id:  {}", creds.user_id);
    println!("role:     {}", creds.role);
    match taskdesk::session::token::expiry_of(&creds.access_token) {
        Ok(exp) => println!("expires:  {} ({}s left)", exp.to_rfc3339(), (exp - chrono::Utc::now()).num_seconds()),
        Err(e) => println!("expires:  unreadable token ({e})"),
    }
    if let Some(p) = rt.store().path() {
        println!("file:     {}", p.display());
    }
}

fn ensure_allowed(rt: &SessionRuntime, role: Option<Role>) -> Result<()> {
    match rt.guard_protected(role) {
        GuardDecision::Allow => Ok(()),
        GuardDecision::RedirectTo(to) => Err(anyhow!("not permitted here; redirect to {to}")),
    }
}

async fn run_tasks(rt: &SessionRuntime, argv: &[String]) -> Result<()> {
    let tasks = rt.tasks();
    match argv.first().map(String::as_str).unwrap_or("list") {
        "list" => {
            ensure_allowed(rt, None)?;
            for t in tasks.list().await? {
                println!("{:>5}  [{:<11}] {}", t.id, t.status, t.title);
            }
        }
        "admin" => {
            ensure_allowed(rt, Some(Role::Admin))?;
            for t in tasks.admin_view().await? {
                println!("{:>5}  user {:<5} [{:<11}] {}", t.id, t.user_id.unwrap_or_default(), t.status, t.title);
            }
        }
        "add" => {
            ensure_allowed(rt, None)?;
            let title = argv.get(1).ok_or_else(|| anyhow!("tasks add requires <title>"))?;
            let mut draft = TaskDraft::new(title.as_str());
            draft.description = argv.get(2).cloned();
            let t = tasks.create(&draft).await?;
            println!("created task {}", t.id);
        }
        "done" => {
            ensure_allowed(rt, None)?;
            let id = argv.get(1).ok_or_else(|| anyhow!("tasks done requires <id>"))?;
            let current = tasks.get(id).await?;
            let draft = TaskDraft { title: current.title, description: current.description, status: TaskStatus::Completed };
            tasks.update(id, &draft).await?;
            println!("task {id} completed");
        }
        "rm" => {
            ensure_allowed(rt, None)?;
            let id = argv.get(1).ok_or_else(|| anyhow!("tasks rm requires <id>"))?;
            tasks.delete(id).await?;
            println!("task {id} deleted");
        }
        other => return Err(anyhow!("unknown tasks subcommand '{other}'")),
    }
    Ok(())
}

fn parse_method(s: &str) -> Result<Method> {
    Ok(match s.to_ascii_uppercase().as_str() {
        "GET" => Method::Get,
        "POST" => Method::Post,
        "PUT" => Method::Put,
        "PATCH" => Method::Patch,
        "DELETE" => Method::Delete,
        other => return Err(anyhow!("unsupported method '{other}'")),
    })
}

/// Print events until the session ends (or Ctrl-C).
async fn watch(rt: &SessionRuntime, renew: bool) -> Result<()> {
    if !rt.store().is_authenticated() {
        println!("anonymous; nothing to watch");
        return Ok(());
    }
    let mut rx = rt.subscribe();
    let _monitor = rt.start_monitor();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("stopped watching");
                return Ok(());
            }
            ev = rx.recv() => {
                let ev = match ev {
                    Ok(ev) => ev,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        println!("(missed {n} events)");
                        continue;
                    }
                    Err(_) => return Ok(()),
                };
                match &ev {
                    SessionEvent::ExpiringSoon { seconds_left } => {
                        println!("session expires in {seconds_left}s");
                        if renew {
                            match rt.monitor().continue_session().await {
                                Ok(()) => println!("session renewed"),
                                Err(e) => println!("renewal failed: {e}"),
                            }
                        }
                    }
                    SessionEvent::CountdownTick { remaining } => println!("logging out in {remaining}s"),
                    SessionEvent::Expired => println!("access token expired"),
                    SessionEvent::Renewed => {}
                    SessionEvent::Terminated { reason, redirect_to, .. } => {
                        println!("session ended ({reason:?}); go to {redirect_to}");
                        return Ok(());
                    }
                }
            }
        }
    }
}
