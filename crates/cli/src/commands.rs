// FILE: crates/cli/src/commands.rs

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use clap::ArgMatches;
use console::style;
use folio_config::{Config, ConfigManager};
use folio_core::{Book, BookFormat, BookMedia, MediaId, MediaType, Tag, TagCategory};
use folio_database::queries::{books, files, fragments, tags as tag_queries};
use folio_library::{
    Assets, BookImporter, BookList, Catalogue, CatalogueSettings, ImportOptions, LibraryError,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const WAIT_UNTIL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Write a default config and create the database
pub async fn init(manager: &ConfigManager, settings: CatalogueSettings) -> Result<()> {
    let created = manager
        .initialize()
        .context("Failed to write the default config")?;
    let database = settings.database_path.clone();
    Catalogue::new(settings)
        .await
        .context("Failed to create the catalogue database")?;

    if created {
        println!("{} Config written to {}", style("✓").green().bold(), manager.config_path().display());
    }
    println!("{} Catalogue initialized at {}", style("✓").green().bold(), database.display());
    Ok(())
}

/// Import books from directories
pub async fn import_books(catalogue: &Catalogue, config: &Config, matches: &ArgMatches) -> Result<()> {
    let directories: Vec<PathBuf> = match matches.get_many::<String>("directories") {
        Some(values) => values.map(PathBuf::from).collect(),
        None => config.catalogue.import_directories.clone(),
    };
    if directories.is_empty() {
        bail!("No directories given and none configured in [catalogue] import_directories");
    }

    let wait_until = matches
        .get_one::<String>("wait-until")
        .map(|s| parse_wait_until(s))
        .transpose()?;
    let quiet = matches.get_flag("quiet");
    if let Some(target) = wait_until {
        if !quiet {
            println!(
                "Will wait until {}; it's {} seconds from now",
                target.format(WAIT_UNTIL_FORMAT),
                (target - Local::now()).num_seconds()
            );
        }
    }

    let mut importer = BookImporter::new(catalogue, import_options(matches)).verbose(!quiet);
    if quiet {
        importer = importer.with_progress(|_| {
            print!(".");
            let _ = std::io::stdout().flush();
        });
    }

    let summary = importer
        .import_directories(&directories)
        .await
        .context("Import failed")?;
    for directory in &summary.invalid_directories {
        eprintln!("{}", style(format!("{}: Not a directory. Skipping.", directory.display())).red());
    }

    let report = catalogue.wait_for_builds().await;
    for (label, error) in &report.failed {
        eprintln!("{} {}: {}", style("✗").red().bold(), label, error);
    }

    println!();
    println!("{}", summary);
    println!();

    if let Some(target) = wait_until {
        println!("Waiting...");
        match (target - Local::now()).to_std() {
            Ok(duration) => tokio::time::sleep(duration).await,
            Err(_) => println!("it's already too late"),
        }
    }
    Ok(())
}

/// List books by author, with parts under their parents
pub async fn list_books(catalogue: &Catalogue, matches: &ArgMatches) -> Result<()> {
    let filter = match matches.get_one::<String>("tags") {
        Some(path) => resolve_tags(catalogue, path).await?,
        None => Vec::new(),
    };
    let list = catalogue.book_list(&filter).await.context("Failed to list books")?;

    if list.by_author.iter().all(|(_, books)| books.is_empty()) && list.orphans.is_empty() {
        println!("No books in the catalogue. Use the 'import' command to add some.");
        return Ok(());
    }

    for (author, books) in &list.by_author {
        if books.is_empty() {
            continue;
        }
        println!("\n{}", style(&author.name).bold().cyan());
        for book in books {
            print_book_tree(&list, book, 1);
        }
    }
    if !list.orphans.is_empty() {
        println!("\n{}", style("Anonymous").bold().cyan());
        for book in &list.orphans {
            print_book_tree(&list, book, 1);
        }
    }
    Ok(())
}

/// Show detailed information about a book
pub async fn show_book_info(catalogue: &Catalogue, matches: &ArgMatches) -> Result<()> {
    let book = find_book(catalogue, matches.get_one::<String>("slug")).await?;
    let info = catalogue.related_info(&book).await?;

    println!("\n{}", style(catalogue.pretty_title(&book).await?).bold().cyan());
    println!("{}", "=".repeat(80));
    println!("Slug: {}", book.slug);
    println!("Language: {}", book.language);
    if book.common_slug != book.slug {
        println!("Variant of: {}", book.common_slug);
    }
    for (category, tags) in &info.tags {
        let names: Vec<&str> = tags.iter().map(|(name, _)| name.as_str()).collect();
        println!("{}: {}", category, names.join(", "));
    }
    let audiences = book.audiences_pl();
    if !audiences.is_empty() {
        println!("Audience: {}", audiences.join(", "));
    }
    if !book.description.is_empty() {
        println!("\nDescription:\n{}", book.description);
    }

    let parts = books::get_children(catalogue.pool(), book.id).await?;
    if !parts.is_empty() {
        println!("\nParts:");
        for part in parts {
            println!("  {}. {} ({})", part.parent_number + 1, part.title, part.slug);
        }
    }

    println!("\nFiles:");
    for (format, path) in files::list_book_files(catalogue.pool(), book.id).await? {
        println!("  {:<6} {}", format, path);
    }
    let media: Vec<_> = info.media.iter().filter(|(_, present)| **present).map(|(t, _)| t.as_str()).collect();
    if !media.is_empty() {
        println!("Media: {}", media.join(", "));
    }

    let themes = catalogue.related_themes(&book).await?;
    if !themes.is_empty() {
        let themes: Vec<String> = themes.iter().map(|(t, n)| format!("{} ({})", t.name, n)).collect();
        println!("\nThemes: {}", themes.join(", "));
    }
    if let Some(fragment) = catalogue.choose_fragment(&book).await? {
        println!("\n{}", style(fragment.display_text()).italic());
    }
    Ok(())
}

/// Search books, fragments or tags
pub async fn search(catalogue: &Catalogue, matches: &ArgMatches) -> Result<()> {
    let query = matches
        .get_one::<String>("query")
        .ok_or_else(|| anyhow!("Search query is required"))?;
    let limit = matches.get_one::<i64>("limit").copied().unwrap_or(20);
    let target = matches.get_one::<String>("target").map(|s| s.as_str()).unwrap_or("books");

    let lines: Vec<String> = match target {
        "fragments" => {
            let found = catalogue.search_fragments(query, limit).await.context("Failed to search fragments")?;
            let ids: Vec<_> = found.iter().map(|f| f.book_id).collect();
            let titles: BTreeMap<_, _> = books::get_books(catalogue.pool(), &ids)
                .await?
                .into_iter()
                .map(|b| (b.id, b.title))
                .collect();
            found
                .iter()
                .map(|f| {
                    let title = titles.get(&f.book_id).map(String::as_str).unwrap_or("?");
                    format!("{}: {}", style(title).bold(), f.display_text())
                })
                .collect()
        }
        "tags" => catalogue
            .search_tags(query, limit)
            .await
            .context("Failed to search tags")?
            .iter()
            .map(tag_line)
            .collect(),
        "hints" => catalogue
            .tag_hints(query, limit)
            .await
            .context("Failed to look up tag hints")?
            .iter()
            .map(tag_line)
            .collect(),
        _ => catalogue
            .search_books(query, limit)
            .await
            .context("Failed to search books")?
            .iter()
            .map(|b| format!("{} ({})", style(&b.title).bold(), b.slug))
            .collect(),
    };

    if lines.is_empty() {
        println!("Nothing found matching '{}'", query);
        return Ok(());
    }
    println!("\n{} results for '{}'", style(lines.len()).bold().cyan(), query);
    println!("{}", "=".repeat(80));
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

/// List tags with counts
pub async fn list_tags(catalogue: &Catalogue, matches: &ArgMatches) -> Result<()> {
    let category = matches
        .get_one::<String>("category")
        .map(|s| parse_category(s))
        .transpose()?;
    let tags = catalogue.tags_with_counts(category).await.context("Failed to list tags")?;

    let mut current = None;
    for (tag, count) in tags {
        if current != Some(tag.category) {
            println!("\n{}", style(tag.category.url_name()).bold().cyan());
            current = Some(tag.category);
        }
        println!("  {:<40} {:>5}", tag.name, count);
    }
    Ok(())
}

/// Shelf subcommands
pub async fn shelf(catalogue: &Catalogue, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("create", m)) => {
            let shelf = catalogue.create_shelf(required(m, "user")?, required(m, "name")?).await?;
            println!("{} Created shelf '{}' ({})", style("✓").green().bold(), shelf.name, shelf.slug);
        }
        Some(("list", m)) => {
            let shelves = catalogue.user_shelves(required(m, "user")?).await?;
            if shelves.is_empty() {
                println!("No shelves.");
            }
            for (shelf, count) in shelves {
                println!("{:<40} {:>5}  {}", shelf.name, count, shelf.slug);
            }
        }
        Some(("show", m)) => {
            let shelf = catalogue.tag(TagCategory::Set, required(m, "shelf")?).await?;
            println!("{}", style(&shelf.name).bold().cyan());
            for book in catalogue.shelf_books(&shelf).await? {
                println!("  {} ({})", book.title, book.slug);
            }
        }
        Some(("add", m)) => {
            let shelf = catalogue.tag(TagCategory::Set, required(m, "shelf")?).await?;
            let book = catalogue.book(required(m, "book")?).await?;
            catalogue.add_to_shelf(required(m, "user")?, &shelf, &book).await?;
            println!("{} Put '{}' on '{}'", style("✓").green().bold(), book.title, shelf.name);
        }
        Some(("remove", m)) => {
            let shelf = catalogue.tag(TagCategory::Set, required(m, "shelf")?).await?;
            let book = catalogue.book(required(m, "book")?).await?;
            if catalogue.remove_from_shelf(required(m, "user")?, &shelf, &book).await? {
                println!("{} Took '{}' off '{}'", style("✓").green().bold(), book.title, shelf.name);
            } else {
                println!("'{}' is not on '{}'", book.title, shelf.name);
            }
        }
        Some(("delete", m)) => {
            let shelf = catalogue.tag(TagCategory::Set, required(m, "shelf")?).await?;
            catalogue.delete_shelf(required(m, "user")?, &shelf).await?;
            println!("{} Deleted shelf '{}'", style("✓").green().bold(), shelf.name);
        }
        _ => bail!("Unknown shelf command"),
    }
    Ok(())
}

/// Media subcommands
pub async fn media(catalogue: &Catalogue, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("add", m)) => {
            let book = catalogue.book(required(m, "book")?).await?;
            let media_type = MediaType::from_str(required(m, "type")?)?;
            let file = Path::new(required(m, "file")?);
            if !file.is_file() {
                bail!("File not found: {}", file.display());
            }
            let media = catalogue
                .save_media(BookMedia::new(book.id, media_type, required(m, "name")?), Some(file))
                .await
                .context("Failed to attach media")?;
            println!("{} Attached {} as #{}", style("✓").green().bold(), media, media.id);
            if !media.extra_info.artist_name.is_empty() {
                println!("  Read by: {}", media.extra_info.artist_name);
            }
        }
        Some(("list", m)) => {
            let book = catalogue.book(required(m, "book")?).await?;
            for media_type in MediaType::ALL {
                if let Assets::Media(items) =
                    catalogue.get_media(&book, media_type.as_str()).await?
                {
                    for item in items {
                        println!("#{:<5} {:<6} {}", item.id, media_type, item);
                    }
                }
            }
        }
        Some(("remove", m)) => {
            let id = m
                .get_one::<i64>("id")
                .copied()
                .ok_or_else(|| anyhow!("Media ID is required"))?;
            catalogue.delete_media(MediaId(id)).await.context("Failed to remove media")?;
            println!("{} Removed media #{}", style("✓").green().bold(), id);
        }
        _ => bail!("Unknown media command"),
    }
    Ok(())
}

/// Delete a book from the catalogue
pub async fn delete_book(catalogue: &Catalogue, matches: &ArgMatches) -> Result<()> {
    let book = find_book(catalogue, matches.get_one::<String>("slug")).await?;

    if !matches.get_flag("force") {
        println!("Are you sure you want to delete '{}'? (y/N)", book.title);
        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .context("Failed to read input")?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    catalogue
        .delete_book(&book.slug)
        .await
        .context("Failed to delete book")?;
    println!("{} Book deleted: {}", style("✓").green().bold(), book.title);
    Ok(())
}

/// Rebuild derived files of a book
pub async fn rebuild(catalogue: &Catalogue, matches: &ArgMatches) -> Result<()> {
    let book = find_book(catalogue, matches.get_one::<String>("slug")).await?;
    let formats: Vec<BookFormat> = match matches.get_many::<String>("format") {
        Some(values) => values
            .map(|v| BookFormat::from_str(v))
            .collect::<std::result::Result<_, _>>()?,
        None => vec![BookFormat::Html, BookFormat::Txt],
    };

    for format in formats {
        match format {
            BookFormat::Html => {
                if !catalogue.build_html(&book).await? {
                    println!("{} has no text to render", book.slug);
                }
            }
            BookFormat::Txt => catalogue.build_txt(&book).await,
            BookFormat::Cover => catalogue.build_cover(&book).await,
            BookFormat::Xml => bail!("The XML source is not a derived file"),
            other => catalogue.schedule(&book, other).await,
        }
    }

    let report = catalogue.wait_for_builds().await;
    println!("{} {} builds finished", style("✓").green().bold(), report.succeeded);
    for (label, error) in &report.failed {
        eprintln!("{} {}: {}", style("✗").red().bold(), label, error);
    }
    Ok(())
}

/// Show catalogue statistics
pub async fn show_stats(catalogue: &Catalogue) -> Result<()> {
    let pool = catalogue.pool();
    let book_count = books::count_books(pool).await.context("Failed to count books")?;
    let fragment_count = fragments::count_fragments(pool).await?;
    let all_books = books::list_books(pool).await?;
    let top_level = all_books.iter().filter(|b| b.parent_id.is_none()).count();

    let mut per_category: BTreeMap<TagCategory, usize> = BTreeMap::new();
    for tag in tag_queries::list_tags(pool, None).await? {
        *per_category.entry(tag.category).or_default() += 1;
    }

    println!("\n{}", style("Catalogue Statistics").bold().cyan());
    println!("{}", "=".repeat(80));
    println!("Books: {} ({} top-level)", style(book_count).bold(), top_level);
    println!("Fragments: {}", style(fragment_count).bold());
    for (category, count) in per_category {
        println!("Tags ({}): {}", category, count);
    }
    Ok(())
}

/// One exported book with its tags and stored files
#[derive(Debug, Serialize)]
pub struct ExportedBook {
    #[serde(flatten)]
    pub book: Book,
    pub tags: Vec<String>,
    pub files: BTreeMap<String, String>,
}

/// Export catalogue data as JSON
pub async fn export_catalogue(catalogue: &Catalogue, matches: &ArgMatches) -> Result<()> {
    let output = matches
        .get_one::<String>("output")
        .map(|s| s.as_str())
        .unwrap_or("catalogue_export.json");

    let records = export_records(catalogue).await?;
    let json = serde_json::to_string_pretty(&records).context("Failed to serialize to JSON")?;
    std::fs::write(output, json).context("Failed to write export file")?;

    println!("{} Exported {} books to {}", style("✓").green().bold(), records.len(), output);
    Ok(())
}

pub async fn export_records(catalogue: &Catalogue) -> Result<Vec<ExportedBook>> {
    let mut records = Vec::new();
    for book in books::list_books(catalogue.pool()).await? {
        let tags = tag_queries::get_book_tags(catalogue.pool(), book.id)
            .await?
            .iter()
            .filter(|t| t.category != TagCategory::Set)
            .map(Tag::url_chunk)
            .collect();
        let files = files::list_book_files(catalogue.pool(), book.id)
            .await?
            .into_iter()
            .map(|(format, path)| (format.to_string(), path))
            .collect();
        records.push(ExportedBook { book, tags, files });
    }
    Ok(records)
}

/// Per-book switches from the import flags
pub fn import_options(matches: &ArgMatches) -> ImportOptions {
    ImportOptions {
        overwrite: matches.get_flag("force"),
        build_epub: !matches.get_flag("no-build-epub"),
        build_txt: !matches.get_flag("no-build-txt"),
        build_pdf: !matches.get_flag("no-build-pdf"),
        build_mobi: !matches.get_flag("no-build-mobi"),
        search_index: !matches.get_flag("no-search-index"),
        search_index_tags: !matches.get_flag("no-search-index"),
    }
}

/// Parses a `Y-M-D h:m:s` local time
pub fn parse_wait_until(value: &str) -> Result<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(value, WAIT_UNTIL_FORMAT)
        .with_context(|| format!("Invalid time '{}', expected Y-M-D h:m:s", value))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| anyhow!("{} does not exist in the local time zone", value))
}

/// Accepts catalogue words (`autor`) and category names (`author`)
pub fn parse_category(value: &str) -> Result<TagCategory> {
    TagCategory::from_url_name(value)
        .or_else(|| TagCategory::from_str(value).ok())
        .ok_or_else(|| anyhow!("Unknown tag category '{}'", value))
}

/// Resolves a catalogue path, accepting deprecated bare slugs with a hint
pub async fn resolve_tags(catalogue: &Catalogue, path: &str) -> Result<Vec<Tag>> {
    match catalogue.get_tag_list(path).await {
        Ok(tags) => Ok(tags),
        Err(LibraryError::DeprecatedTagPath { tags }) => {
            eprintln!(
                "{} use the full path: {}",
                style("note:").yellow().bold(),
                Catalogue::tag_path(&tags)
            );
            Ok(tags)
        }
        Err(LibraryError::AmbiguousTags { tags, ambiguous_slugs }) => {
            let mut message = format!("Ambiguous tags: {}", ambiguous_slugs.join(", "));
            for slug in &ambiguous_slugs {
                for candidate in tag_queries::find_tags_by_slug(catalogue.pool(), slug).await? {
                    let mut chosen = tags.clone();
                    chosen.push(candidate);
                    message.push_str(&format!("\n  {}", Catalogue::tag_path(&chosen)));
                }
            }
            bail!(message)
        }
        Err(e) => Err(e.into()),
    }
}

async fn find_book(catalogue: &Catalogue, slug: Option<&String>) -> Result<Book> {
    let slug = slug.ok_or_else(|| anyhow!("Book slug is required"))?;
    catalogue
        .book(slug)
        .await
        .with_context(|| format!("No book '{}'", slug))
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} is required", name))
}

fn print_book_tree(list: &BookList, book: &Book, depth: usize) {
    println!("{}{} ({})", "  ".repeat(depth), book.title, style(&book.slug).dim());
    for part in list.children(book.id) {
        print_book_tree(list, part, depth + 1);
    }
}

fn tag_line(tag: &Tag) -> String {
    format!("{} ({})", style(&tag.name).bold(), tag.url_chunk())
}
