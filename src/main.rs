use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use clap::Parser;

use gather::api::{ApiClient, TokenCell};
use gather::cli::{self, Args, Context};
use gather::config::Config;
use gather::session::SessionStore;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = if let Some(config_path) = &args.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    if let Err(errors) = config.validate() {
        eprintln!("Invalid configuration:");
        for error in &errors {
            eprintln!("  {error}");
        }
        std::process::exit(1);
    }

    let base_url = config.resolve_base_url(args.base_url.as_deref());
    let data_dir = config.resolve_data_dir(args.data_dir.as_deref())?;

    // The token cell is shared between the session store (writer) and the
    // API client (reader); the unauthorized hook closes the loop back from
    // the transport to the session.
    let token: TokenCell = Rc::new(RefCell::new(None));
    let session = Rc::new(RefCell::new(SessionStore::new(data_dir, token.clone())));
    session.borrow_mut().hydrate();

    let hook_session = session.clone();
    let api = ApiClient::new(
        &base_url,
        token,
        Box::new(move || {
            hook_session.borrow_mut().expire();
            eprintln!("Session expired - log in again with 'login'.");
        }),
        args.verbose,
    );

    let ctx = Context {
        args,
        config,
        api,
        session,
    };

    match &ctx.args.command {
        Some(line) => cli::run_once(&ctx, line),
        None => cli::run_repl(&ctx),
    }
}
