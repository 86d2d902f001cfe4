use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use tiempo_justo::{
    Config, Profile, Session,
    cli::{self, Cli, Commands},
    logging,
};

fn main() -> Result<()> {
    // Set up error reporting with color-eyre
    color_eyre::install()?;

    let cli = Cli::parse();

    // --dev keeps config and data apart from the real ones
    let profile = if cli.dev { Profile::Dev } else { Profile::Prod };

    let config = Config::load_with_profile(profile, cli.config.as_deref().map(PathBuf::from))?;
    logging::init(&config.get_data_path(), &config.log_level)?;

    let mut session = Session::open(&config)?;

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => {
            let app = tiempo_justo::tui::App::new(config, session);
            tiempo_justo::tui::run_event_loop(app)?;
            return Ok(());
        }
        Commands::AddTask {
            title,
            priority,
            description,
            project,
        } => cli::handle_add_task(title, priority, description, project, &mut session)?,
        Commands::ToggleTask { id } => cli::handle_toggle_task(id, &mut session)?,
        Commands::RemoveTask { id } => cli::handle_remove_task(id, &mut session)?,
        Commands::ListTasks => cli::handle_list_tasks(&session)?,
        Commands::AddProject { name } => cli::handle_add_project(name, &mut session)?,
        Commands::CompleteProject { id } => cli::handle_complete_project(id, &mut session)?,
        Commands::RemoveProject { id } => cli::handle_remove_project(id, &mut session)?,
        Commands::ListProjects => cli::handle_list_projects(&session)?,
        Commands::Stats { month } => cli::handle_stats(month, &session)?,
        Commands::Pomodoro {
            focus,
            short_break,
            long_break,
        } => cli::handle_pomodoro(focus, short_break, long_break, &mut session)?,
        Commands::Hours { start, end, target } => cli::handle_hours(start, end, target)?,
    }

    // One-shot commands exit long before the debounce would fire
    session.flush();
    Ok(())
}
