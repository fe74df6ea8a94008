use crate::{
    audit::AuditLog,
    error::{OpResult, RegistryError},
    input::{ProfileForm, SiteForm, UserForm},
    registry::Registry,
    rules,
    session::Session,
    Args,
};
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::cell::RefCell;
use std::path::PathBuf;

pub struct Context {
    pub args: Args,
    pub root: PathBuf,
    pub registry: RefCell<Registry>,
    pub audit: RefCell<AuditLog>,
}

/// Commands whose arguments may carry passwords; never kept in history
const SECRET_COMMANDS: &[&str] = &["/login", "/register"];

pub fn run_repl(ctx: Context) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    let history = ctx.root.join(".vfarm").join("history");
    let _ = rl.load_history(&history);

    println!("vfarm - type /help for commands, /exit to quit");
    println!("Log in with /login <username>, or create an account with /register <username>");

    loop {
        let prompt = format!("{}> ", prompt_label(&ctx));
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if !SECRET_COMMANDS.iter().any(|c| line.starts_with(c)) {
                    rl.add_history_entry(line)?;
                }

                if handle_command(&ctx, &mut rl, line) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Input error: {}", e);
                break;
            }
        }
    }

    if let Some(parent) = history.parent() {
        if std::fs::create_dir_all(parent).is_ok() {
            let _ = rl.save_history(&history);
        }
    }
    Ok(())
}

fn prompt_label(ctx: &Context) -> String {
    let registry = ctx.registry.borrow();
    let who = match registry.session() {
        Session::LoggedOut => return "vfarm".to_string(),
        Session::Admin => registry.admin_name(),
        Session::User(name) => name.as_str(),
    };
    format!("vfarm [{}]", who)
}

fn handle_command(ctx: &Context, rl: &mut DefaultEditor, line: &str) -> bool {
    let words = match shell_words::split(line) {
        Ok(words) => words,
        Err(e) => {
            println!("Invalid input: {}", e);
            return false;
        }
    };
    let Some((cmd, args)) = words.split_first() else {
        return false;
    };
    let args: Vec<&str> = args.iter().map(|s| s.as_str()).collect();

    match cmd.as_str() {
        "/exit" | "/quit" => return true,
        "/help" => print_help(),
        "/login" => handle_login(ctx, rl, &args),
        "/logout" => handle_logout(ctx),
        "/register" => handle_register(ctx, rl, &args),
        "/whoami" => {
            let registry = ctx.registry.borrow();
            println!("{}", registry.session().label(registry.admin_name()));
        }
        "/session" => {
            let audit = ctx.audit.borrow();
            let registry = ctx.registry.borrow();
            println!("Session: {}", audit.session_id());
            match &audit.path {
                Some(path) => println!("Audit log: {}", path.display()),
                None => println!("Audit log: disabled"),
            }
            println!("Users file: {}", registry.storage().users_path().display());
            println!("Sites file: {}", registry.storage().sites_path().display());
        }
        "/reload" => {
            let warnings = ctx.registry.borrow_mut().reload();
            for warning in &warnings {
                warn_load(ctx, warning);
            }
            let registry = ctx.registry.borrow();
            println!(
                "Reloaded {} users and {} sites",
                registry.user_count(),
                registry.site_count()
            );
        }
        "/users" => list_users(ctx),
        "/user" => handle_user_command(ctx, rl, &args),
        "/sites" => list_sites(ctx),
        "/site" => handle_site_command(ctx, rl, &args),
        "/profile" => handle_profile_command(ctx, rl, &args),
        "/check" => handle_check_command(&args),
        _ => println!("Unknown command: {}", cmd),
    }
    false
}

fn print_help() {
    println!("Commands:");
    println!("  /exit                   - quit");
    println!("  /help                   - show commands");
    println!("  /login <user> [pass]    - log in (prompts for the password if omitted)");
    println!("  /logout                 - end the current session");
    println!("  /register <user>        - create an account, then log in to fill in your details");
    println!("  /whoami                 - show who is logged in");
    println!("  /session                - show session and file locations");
    println!("  /reload                 - re-read the data files");
    println!("  /check eligibility <age> <income>  - would an applicant qualify?");
    println!("  /check capacity <floors> <area>    - production capacity of a site");
    println!("Your profile:");
    println!("  /profile                - show your details");
    println!("  /profile edit           - fill in or change your details");
    println!("Administrator:");
    println!("  /users                  - list users");
    println!("  /user show <name>       - show one user");
    println!("  /user add               - add a user");
    println!("  /user edit <name>       - update a user (blank fields keep their value)");
    println!("  /user rm <name>         - remove a user");
    println!("  /sites                  - list farm sites");
    println!("  /site show <name>       - show one site");
    println!("  /site add               - add a site");
    println!("  /site edit <name>       - update a site (blank fields keep their value)");
    println!("  /site rm <name>         - remove a site");
}

/// Print an operation outcome and record it in the audit log
fn report(ctx: &Context, op: &str, key: &str, result: OpResult) {
    let logged = match &result {
        Ok(message) => {
            println!("{}", message);
            ctx.audit.borrow_mut().operation(op, key, true, None)
        }
        Err(e) => {
            println!("Error: {}", e);
            if ctx.args.debug {
                eprintln!("[DEBUG] {} '{}' failed: {} ({:?})", op, key, e.code(), e);
            }
            ctx.audit
                .borrow_mut()
                .operation(op, key, false, Some(e.code()))
        }
    };
    if let Err(e) = logged {
        eprintln!("Warning: failed to write audit log: {}", e);
    }
}

pub fn warn_load(ctx: &Context, warning: &str) {
    eprintln!("Warning: {}", warning);
    if let Err(e) = ctx.audit.borrow_mut().load_warning(warning) {
        eprintln!("Warning: failed to write audit log: {}", e);
    }
}

/// Prompt for each field in turn. None if the user cancels with Ctrl-C/Ctrl-D.
fn read_form(rl: &mut DefaultEditor, fields: &[(&str, Option<String>)]) -> Option<Vec<String>> {
    let mut values = Vec::with_capacity(fields.len());
    for (label, current) in fields {
        let prompt = match current {
            Some(value) => format!("  {} [{}]: ", label, value),
            None => format!("  {}: ", label),
        };
        match rl.readline(&prompt) {
            Ok(value) => values.push(value.trim().to_string()),
            Err(_) => {
                println!("Cancelled");
                return None;
            }
        }
    }
    Some(values)
}

fn read_one(rl: &mut DefaultEditor, label: &str) -> Option<String> {
    read_form(rl, &[(label, None)]).and_then(|mut v| v.pop())
}

fn confirm(rl: &mut DefaultEditor, question: &str) -> bool {
    match rl.readline(&format!("{} [y/N] ", question)) {
        Ok(answer) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}

fn handle_login(ctx: &Context, rl: &mut DefaultEditor, args: &[&str]) {
    let Some(username) = args.first().map(|s| s.to_string()) else {
        println!("Usage: /login <username> [password]");
        return;
    };
    let password = match args.get(1) {
        Some(p) => p.to_string(),
        None => match read_one(rl, "Password") {
            Some(p) => p,
            None => return,
        },
    };

    let result = ctx.registry.borrow_mut().login(&username, &password);
    let ok = result.is_ok();
    match result {
        Ok(message) => println!("{}", message),
        Err(e) => println!("Error: {}", e),
    }
    if let Err(e) = ctx.audit.borrow_mut().login(&username, ok) {
        eprintln!("Warning: failed to write audit log: {}", e);
    }

    if ok {
        let registry = ctx.registry.borrow();
        if let Ok((_, record)) = registry.profile() {
            if record.is_pending() {
                println!("Please fill in your complete details with /profile edit");
            }
        }
    }
}

fn handle_logout(ctx: &Context) {
    let mut registry = ctx.registry.borrow_mut();
    let ended = registry.logout();
    if !ended.is_logged_in() {
        println!("Not logged in");
        return;
    }
    let who = ended.label(registry.admin_name());
    drop(registry);
    println!("You have been logged out.");
    if let Err(e) = ctx.audit.borrow_mut().logout(&who) {
        eprintln!("Warning: failed to write audit log: {}", e);
    }
}

fn handle_register(ctx: &Context, rl: &mut DefaultEditor, args: &[&str]) {
    let username = match args.first() {
        Some(u) => u.to_string(),
        None => match read_one(rl, "Username") {
            Some(u) => u,
            None => return,
        },
    };
    let Some(values) = read_form(rl, &[("Password", None), ("Confirm password", None)]) else {
        return;
    };

    let result = ctx
        .registry
        .borrow_mut()
        .register(&username, &values[0], &values[1]);
    report(ctx, "register", &username, result);
}

// ----------------------------------------------------------------------------
// Users
// ----------------------------------------------------------------------------

fn list_users(ctx: &Context) {
    let registry = ctx.registry.borrow();
    match registry.list_users() {
        Ok(users) if users.is_empty() => println!("No users registered."),
        Ok(users) => {
            println!("Users:");
            for (name, user) in users {
                println!("  {}", user.summary(name));
            }
        }
        Err(e) => println!("Error: {}", e),
    }
}

fn handle_user_command(ctx: &Context, rl: &mut DefaultEditor, args: &[&str]) {
    match (args.first().copied(), args.get(1).copied()) {
        (Some("add"), _) => {
            let fields = [
                ("Username", None),
                ("Password", None),
                ("Name", None),
                ("Age", None),
                ("Address", None),
                ("Household size", None),
                ("Income", None),
                ("Profession", None),
            ];
            let Some(v) = read_form(rl, &fields) else {
                return;
            };
            let form = UserForm {
                username: v[0].clone(),
                password: v[1].clone(),
                name: v[2].clone(),
                age: v[3].clone(),
                address: v[4].clone(),
                household_size: v[5].clone(),
                income: v[6].clone(),
                profession: v[7].clone(),
            };
            let result = ctx.registry.borrow_mut().create_user(&form);
            report(ctx, "create_user", &form.username, result);
        }
        (Some("edit"), Some(username)) => {
            let registry = ctx.registry.borrow();
            if let Err(e) = registry.require_admin() {
                println!("Error: {}", e);
                return;
            }
            let current = registry.user(username).cloned();
            drop(registry);
            let Some(current) = current else {
                report(
                    ctx,
                    "update_user",
                    username,
                    Err(RegistryError::UserNotFound(username.to_string())),
                );
                return;
            };
            let p = current.profile.unwrap_or_default();
            let fields = [
                ("Password", None),
                ("Name", Some(p.name)),
                ("Age", Some(p.age.to_string())),
                ("Address", Some(p.address)),
                ("Household size", Some(p.household_size.to_string())),
                ("Income", Some(p.income.to_string())),
                ("Profession", Some(p.profession)),
            ];
            println!("Leave a field blank to keep its current value.");
            let Some(v) = read_form(rl, &fields) else {
                return;
            };
            let form = UserForm {
                username: username.to_string(),
                password: v[0].clone(),
                name: v[1].clone(),
                age: v[2].clone(),
                address: v[3].clone(),
                household_size: v[4].clone(),
                income: v[5].clone(),
                profession: v[6].clone(),
            };
            let result = ctx.registry.borrow_mut().update_user(&form);
            report(ctx, "update_user", username, result);
        }
        (Some("rm"), Some(username)) => {
            let allowed = ctx.registry.borrow().require_admin();
            if let Err(e) = allowed {
                report(ctx, "remove_user", username, Err(e));
                return;
            }
            if !confirm(rl, &format!("Remove user {}?", username)) {
                println!("Cancelled");
                return;
            }
            let result = ctx.registry.borrow_mut().remove_user(username);
            report(ctx, "remove_user", username, result);
        }
        (Some("show"), Some(username)) => {
            let registry = ctx.registry.borrow();
            if let Err(e) = registry.require_admin() {
                println!("Error: {}", e);
                return;
            }
            match registry.user(username) {
                Some(user) => print_user(username, user),
                None => println!("Error: User '{}' not found", username),
            }
        }
        _ => {
            println!("User commands:");
            println!("  /user show <name>");
            println!("  /user add");
            println!("  /user edit <name>");
            println!("  /user rm <name>");
        }
    }
}

fn print_user(username: &str, user: &crate::records::UserRecord) {
    println!("Username:   {}", username);
    println!("Registered: {}", if user.registered { "yes" } else { "no" });
    match &user.profile {
        Some(p) => {
            println!("Name:       {}", p.name);
            println!("Age:        {}", p.age);
            println!("Address:    {}", p.address);
            println!("Household:  {}", p.household_size);
            println!("Income:     {:.2}", p.income);
            println!("Profession: {}", p.profession);
            println!("Eligible:   {}", if p.eligible { "Yes" } else { "No" });
            println!("Site:       {}", p.assigned_site);
            println!("Deadline:   {}", p.appointment_deadline);
        }
        None => println!("Profile:    not filled in yet"),
    }
}

// ----------------------------------------------------------------------------
// Sites
// ----------------------------------------------------------------------------

fn list_sites(ctx: &Context) {
    let registry = ctx.registry.borrow();
    match registry.list_sites() {
        Ok(sites) if sites.is_empty() => println!("No sites registered."),
        Ok(sites) => {
            println!("Sites:");
            for (name, site) in sites {
                println!("  {}", site.summary(name));
            }
        }
        Err(e) => println!("Error: {}", e),
    }
}

fn handle_site_command(ctx: &Context, rl: &mut DefaultEditor, args: &[&str]) {
    match (args.first().copied(), args.get(1).copied()) {
        (Some("add"), _) => {
            let fields = [
                ("Site name", None),
                ("Address", None),
                ("Responsible person", None),
                ("Contact", None),
                ("Floors", None),
                ("Area (m2)", None),
            ];
            let Some(v) = read_form(rl, &fields) else {
                return;
            };
            let form = SiteForm {
                name: v[0].clone(),
                address: v[1].clone(),
                responsible_person: v[2].clone(),
                contact: v[3].clone(),
                floors: v[4].clone(),
                area_m2: v[5].clone(),
            };
            let result = ctx.registry.borrow_mut().create_site(&form);
            report(ctx, "create_site", &form.name, result);
        }
        (Some("edit"), Some(name)) => {
            let registry = ctx.registry.borrow();
            if let Err(e) = registry.require_admin() {
                println!("Error: {}", e);
                return;
            }
            let current = registry.site(name).cloned();
            drop(registry);
            let Some(s) = current else {
                report(
                    ctx,
                    "update_site",
                    name,
                    Err(RegistryError::SiteNotFound(name.to_string())),
                );
                return;
            };
            let fields = [
                ("Address", Some(s.address)),
                ("Responsible person", Some(s.responsible_person)),
                ("Contact", Some(s.contact)),
                ("Floors", Some(s.floors.to_string())),
                ("Area (m2)", Some(s.area_m2.to_string())),
            ];
            println!("Leave a field blank to keep its current value.");
            let Some(v) = read_form(rl, &fields) else {
                return;
            };
            let form = SiteForm {
                name: name.to_string(),
                address: v[0].clone(),
                responsible_person: v[1].clone(),
                contact: v[2].clone(),
                floors: v[3].clone(),
                area_m2: v[4].clone(),
            };
            let result = ctx.registry.borrow_mut().update_site(&form);
            report(ctx, "update_site", name, result);
        }
        (Some("rm"), Some(name)) => {
            let allowed = ctx.registry.borrow().require_admin();
            if let Err(e) = allowed {
                report(ctx, "remove_site", name, Err(e));
                return;
            }
            if !confirm(rl, &format!("Remove site {}?", name)) {
                println!("Cancelled");
                return;
            }
            let result = ctx.registry.borrow_mut().remove_site(name);
            report(ctx, "remove_site", name, result);
        }
        (Some("show"), Some(name)) => {
            let registry = ctx.registry.borrow();
            if let Err(e) = registry.require_admin() {
                println!("Error: {}", e);
                return;
            }
            match registry.site(name) {
                Some(s) => {
                    println!("Site:        {}", name);
                    println!("Address:     {}", s.address);
                    println!("Responsible: {}", s.responsible_person);
                    println!("Contact:     {}", s.contact);
                    println!("Floors:      {}", s.floors);
                    println!("Area (m2):   {}", s.area_m2);
                    println!("Capacity:    {}", s.production_capacity);
                    println!("Eligible:    {}", s.eligible);
                    println!("Note:        {}", s.note);
                }
                None => println!("Error: Site '{}' not found", name),
            }
        }
        _ => {
            println!("Site commands:");
            println!("  /site show <name>");
            println!("  /site add");
            println!("  /site edit <name>");
            println!("  /site rm <name>");
        }
    }
}

// ----------------------------------------------------------------------------
// Self-service profile
// ----------------------------------------------------------------------------

fn handle_profile_command(ctx: &Context, rl: &mut DefaultEditor, args: &[&str]) {
    match args.first().copied() {
        None | Some("show") => {
            let registry = ctx.registry.borrow();
            match registry.profile() {
                Ok((name, record)) => {
                    print_user(name, record);
                    if record.is_pending() {
                        println!("Please fill in your complete details with /profile edit");
                    }
                }
                Err(e) => println!("Error: {}", e),
            }
        }
        Some("edit") => {
            let lookup = ctx
                .registry
                .borrow()
                .profile()
                .map(|(name, record)| (name.to_string(), record.profile.clone()));
            let (username, current) = match lookup {
                Ok(found) => found,
                Err(e) => {
                    println!("Error: {}", e);
                    return;
                }
            };
            let fields = match current {
                Some(p) => [
                    ("Name", Some(p.name)),
                    ("Age", Some(p.age.to_string())),
                    ("Address", Some(p.address)),
                    ("Household size", Some(p.household_size.to_string())),
                    ("Income", Some(p.income.to_string())),
                    ("Profession", Some(p.profession)),
                ],
                None => [
                    ("Name", None),
                    ("Age", None),
                    ("Address", None),
                    ("Household size", None),
                    ("Income", None),
                    ("Profession", None),
                ],
            };
            let Some(v) = read_form(rl, &fields) else {
                return;
            };
            // Blank keeps the value shown in brackets
            let v: Vec<String> = v
                .into_iter()
                .zip(fields.iter())
                .map(|(value, (_, current))| match current {
                    Some(current) if value.is_empty() => current.clone(),
                    _ => value,
                })
                .collect();
            let form = ProfileForm {
                name: v[0].clone(),
                age: v[1].clone(),
                address: v[2].clone(),
                household_size: v[3].clone(),
                income: v[4].clone(),
                profession: v[5].clone(),
            };
            let result = ctx.registry.borrow_mut().save_profile(&form);
            report(ctx, "save_profile", &username, result);
        }
        Some(other) => println!("Unknown profile command: {}. Use /profile or /profile edit", other),
    }
}

// ----------------------------------------------------------------------------
// Quick checks (no login needed)
// ----------------------------------------------------------------------------

fn handle_check_command(args: &[&str]) {
    match args {
        ["eligibility", age, income] => {
            let eligible = rules::eligibility(age, income);
            println!(
                "Eligible: {} (requires age >= {} and income <= {})",
                if eligible { "Yes" } else { "No" },
                rules::MIN_AGE,
                rules::MAX_INCOME
            );
        }
        ["capacity", floors, area] => {
            let capacity = rules::production_capacity(floors, area);
            println!(
                "Production capacity: {} (eligible: {})",
                capacity,
                rules::SiteEligibility::from_capacity(capacity)
            );
        }
        _ => {
            println!("Usage:");
            println!("  /check eligibility <age> <income>");
            println!("  /check capacity <floors> <area>");
        }
    }
}
