// FILE: crates/cli/src/main.rs

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use folio_config::{Config, ConfigManager};
use folio_library::{Catalogue, CatalogueSettings};
use std::path::PathBuf;

mod commands;

fn build_cli() -> Command {
    Command::new("folio")
        .version("0.1.0")
        .author("Folio Developers")
        .about("Digital library catalogue and book publication pipeline")
        .arg(
            Arg::new("config-dir")
                .short('c')
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding config.toml (defaults to the platform config dir)")
                .global(true),
        )
        .arg(
            Arg::new("database")
                .short('d')
                .long("database")
                .value_name("PATH")
                .help("Path to the database file, overriding the config")
                .global(true),
        )
        .arg(
            Arg::new("media-root")
                .long("media-root")
                .value_name("DIR")
                .help("Root directory of stored files, overriding the config")
                .global(true),
        )
        .subcommand(Command::new("init").about("Write a default config and create the database"))
        .subcommand(
            Command::new("import")
                .about("Import books from the specified directories")
                .arg(Arg::new("directories").value_name("DIR").num_args(0..).help("Directories with XML sources (default: configured import directories)"))
                .arg(Arg::new("quiet").short('q').long("quiet").help("Print a dot per file instead of file names").action(ArgAction::SetTrue))
                .arg(Arg::new("force").short('f').long("force").help("Overwrite books that already exist").action(ArgAction::SetTrue))
                .arg(Arg::new("no-build-epub").short('E').long("no-build-epub").help("Don't build EPUB files").action(ArgAction::SetTrue))
                .arg(Arg::new("no-build-mobi").short('M').long("no-build-mobi").help("Don't build MOBI files").action(ArgAction::SetTrue))
                .arg(Arg::new("no-build-txt").short('T').long("no-build-txt").help("Don't build TXT files").action(ArgAction::SetTrue))
                .arg(Arg::new("no-build-pdf").short('P').long("no-build-pdf").help("Don't build PDF files").action(ArgAction::SetTrue))
                .arg(Arg::new("no-search-index").long("no-search-index").help("Don't update the search index").action(ArgAction::SetTrue))
                .arg(Arg::new("wait-until").short('w').long("wait-until").value_name("TIME").help("Wait until the given local time (Y-M-D h:m:s) after importing")),
        )
        .subcommand(
            Command::new("list")
                .about("List books by author and part")
                .arg(Arg::new("tags").value_name("TAG_PATH").help("Catalogue path such as autor/adam-mickiewicz/epoka/romantyzm")),
        )
        .subcommand(
            Command::new("info")
                .about("Show detailed information about a book")
                .arg(Arg::new("slug").required(true).value_name("SLUG").help("Book slug")),
        )
        .subcommand(
            Command::new("search")
                .about("Search books, fragments or tags")
                .arg(Arg::new("query").required(true).value_name("QUERY").help("Search query"))
                .arg(Arg::new("target").short('t').long("target").value_name("TARGET").value_parser(["books", "fragments", "tags", "hints"]).default_value("books").help("What to search"))
                .arg(Arg::new("limit").short('n').long("limit").value_name("N").value_parser(clap::value_parser!(i64)).default_value("20").help("Maximum number of results")),
        )
        .subcommand(
            Command::new("tags")
                .about("List tags with their counts")
                .arg(Arg::new("category").value_name("CATEGORY").help("autor, epoka, rodzaj, gatunek or motyw")),
        )
        .subcommand(
            Command::new("shelf")
                .about("Manage user shelves")
                .subcommand_required(true)
                .subcommand(Command::new("create").about("Create a shelf").arg(Arg::new("user").required(true)).arg(Arg::new("name").required(true)))
                .subcommand(Command::new("list").about("List a user's shelves").arg(Arg::new("user").required(true)))
                .subcommand(Command::new("show").about("List the books on a shelf").arg(Arg::new("shelf").required(true)))
                .subcommand(Command::new("add").about("Put a book on a shelf").arg(Arg::new("user").required(true)).arg(Arg::new("shelf").required(true)).arg(Arg::new("book").required(true)))
                .subcommand(Command::new("remove").about("Take a book off a shelf").arg(Arg::new("user").required(true)).arg(Arg::new("shelf").required(true)).arg(Arg::new("book").required(true)))
                .subcommand(Command::new("delete").about("Delete a shelf").arg(Arg::new("user").required(true)).arg(Arg::new("shelf").required(true))),
        )
        .subcommand(
            Command::new("media")
                .about("Manage audio media attached to books")
                .subcommand_required(true)
                .subcommand(
                    Command::new("add")
                        .about("Attach a media file to a book")
                        .arg(Arg::new("book").required(true).value_name("SLUG"))
                        .arg(Arg::new("type").required(true).value_name("TYPE").value_parser(["mp3", "ogg", "daisy"]))
                        .arg(Arg::new("name").required(true).value_name("NAME"))
                        .arg(Arg::new("file").required(true).value_name("FILE")),
                )
                .subcommand(Command::new("list").about("List media of a book").arg(Arg::new("book").required(true).value_name("SLUG")))
                .subcommand(Command::new("remove").about("Remove a media file").arg(Arg::new("id").required(true).value_name("MEDIA_ID").value_parser(clap::value_parser!(i64)))),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a book from the catalogue")
                .arg(Arg::new("slug").required(true).value_name("SLUG").help("Slug of the book to delete"))
                .arg(Arg::new("force").short('f').long("force").help("Skip confirmation prompt").action(ArgAction::SetTrue)),
        )
        .subcommand(
            Command::new("rebuild")
                .about("Rebuild derived files of a book")
                .arg(Arg::new("slug").required(true).value_name("SLUG"))
                .arg(Arg::new("format").short('F').long("format").value_name("FORMAT").action(ArgAction::Append).value_parser(["html", "txt", "epub", "pdf", "mobi", "cover"]).help("Format to rebuild (repeatable; default: html and txt)")),
        )
        .subcommand(Command::new("stats").about("Show catalogue statistics"))
        .subcommand(
            Command::new("export")
                .about("Export catalogue data")
                .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Output file path").default_value("catalogue_export.json")),
        )
}

fn config_manager(matches: &clap::ArgMatches) -> Result<ConfigManager> {
    match matches.get_one::<String>("config-dir") {
        Some(dir) => ConfigManager::with_directory(PathBuf::from(dir)),
        None => ConfigManager::new(),
    }
    .context("Failed to locate the config directory")
}

/// Config file values, then `FOLIO_*` variables, then command line flags
fn load_settings(manager: &ConfigManager, matches: &clap::ArgMatches) -> Result<(Config, CatalogueSettings)> {
    let config = manager
        .load_with_env_overrides()
        .context("Failed to load configuration")?;

    let mut settings = CatalogueSettings::from(&config);
    settings.database_path = manager.resolve_path(&settings.database_path);
    settings.media_root = manager.resolve_path(&settings.media_root);
    if let Some(path) = matches.get_one::<String>("database") {
        settings.database_path = PathBuf::from(path);
    }
    if let Some(root) = matches.get_one::<String>("media-root") {
        settings.media_root = PathBuf::from(root);
    }
    Ok((config, settings))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let manager = config_manager(&matches)?;
    let (config, settings) = load_settings(&manager, &matches)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.app.log_level.to_string()),
    )
    .init();

    if let Some(("init", _)) = matches.subcommand() {
        return commands::init(&manager, settings).await;
    }

    let catalogue = Catalogue::new(settings)
        .await
        .context("Failed to open the catalogue")?;

    match matches.subcommand() {
        Some(("import", sub_matches)) => commands::import_books(&catalogue, &config, sub_matches).await,
        Some(("list", sub_matches)) => commands::list_books(&catalogue, sub_matches).await,
        Some(("info", sub_matches)) => commands::show_book_info(&catalogue, sub_matches).await,
        Some(("search", sub_matches)) => commands::search(&catalogue, sub_matches).await,
        Some(("tags", sub_matches)) => commands::list_tags(&catalogue, sub_matches).await,
        Some(("shelf", sub_matches)) => commands::shelf(&catalogue, sub_matches).await,
        Some(("media", sub_matches)) => commands::media(&catalogue, sub_matches).await,
        Some(("delete", sub_matches)) => commands::delete_book(&catalogue, sub_matches).await,
        Some(("rebuild", sub_matches)) => commands::rebuild(&catalogue, sub_matches).await,
        Some(("stats", _)) => commands::show_stats(&catalogue).await,
        Some(("export", sub_matches)) => commands::export_catalogue(&catalogue, sub_matches).await,
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_import_flags() {
        let matches = build_cli()
            .try_get_matches_from(["folio", "import", "-q", "-f", "-E", "-P", "lektury", "nowe"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "import");
        assert!(sub.get_flag("quiet"));
        assert!(sub.get_flag("force"));
        assert!(sub.get_flag("no-build-epub"));
        assert!(!sub.get_flag("no-build-txt"));
        let dirs: Vec<&String> = sub.get_many::<String>("directories").unwrap().collect();
        assert_eq!(dirs, vec!["lektury", "nowe"]);
    }

    #[test]
    fn test_settings_resolve_against_config_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let manager = ConfigManager::with_directory(dir.path().to_path_buf()).unwrap();
        let matches = build_cli()
            .try_get_matches_from(["folio", "--media-root", "/srv/media", "stats"])
            .unwrap();

        let (_, settings) = load_settings(&manager, &matches).unwrap();
        assert_eq!(settings.database_path, dir.path().join("folio.db"));
        assert_eq!(settings.media_root, PathBuf::from("/srv/media"));
    }
}
