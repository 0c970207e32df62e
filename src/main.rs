use anyhow::{anyhow, Result};
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use std::path::PathBuf;

use grid_bridge::config::Config;
use grid_bridge::data::csv_loader::load_csv;
use grid_bridge::data::MemoryTable;
use grid_bridge::filter::{FilterCommand, HeaderFilter, MenuView};
use grid_bridge::logging;

fn print_help() {
    println!("grid-filter - apply header filters to a CSV file");
    println!();
    println!("Usage: grid-filter <file.csv> [options]");
    println!();
    println!("Options:");
    println!("  --filter <column>=<v1,v2,...>  Check these values in the column's filter menu and apply");
    println!("  --clear <column>               Clear the column's filter");
    println!("  --sort <column>[:desc]         Sort by column");
    println!("  --menu <column>                Show the column's filter menu after filtering");
    println!("  --search <text>                Search text for --menu");
    println!("  --logs                         Print the log buffer at the end");
    println!("  --print-config                 Print a commented default config and exit");
    println!("  -h, --help                     Show this help");
}

#[derive(Debug, Default)]
struct Options {
    file: Option<PathBuf>,
    filters: Vec<(String, Vec<String>)>,
    clears: Vec<String>,
    sort: Option<(String, bool)>,
    menu: Option<String>,
    search: Option<String>,
    logs: bool,
}

fn value_for(flag: &str, iter: &mut std::slice::Iter<'_, String>) -> Result<String> {
    iter.next()
        .cloned()
        .ok_or_else(|| anyhow!("{} needs a value", flag))
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--filter" => {
                let raw = value_for("--filter", &mut iter)?;
                let (column, values) = raw
                    .split_once('=')
                    .ok_or_else(|| anyhow!("--filter expects <column>=<values>, got '{}'", raw))?;
                let values = values.split(',').map(|v| v.to_string()).collect();
                options.filters.push((column.to_string(), values));
            }
            "--clear" => options.clears.push(value_for("--clear", &mut iter)?),
            "--sort" => {
                let raw = value_for("--sort", &mut iter)?;
                options.sort = Some(match raw.split_once(':') {
                    Some((column, "desc")) => (column.to_string(), false),
                    Some((column, "asc")) => (column.to_string(), true),
                    Some((_, other)) => return Err(anyhow!("Unknown sort direction '{}'", other)),
                    None => (raw.clone(), true),
                });
            }
            "--menu" => options.menu = Some(value_for("--menu", &mut iter)?),
            "--search" => options.search = Some(value_for("--search", &mut iter)?),
            "--logs" => options.logs = true,
            other if other.starts_with('-') => return Err(anyhow!("Unknown option '{}'", other)),
            path => options.file = Some(PathBuf::from(path)),
        }
    }
    Ok(options)
}

fn display_rows(table: &MemoryTable) {
    let mut out = Table::new();
    out.set_content_arrangement(ContentArrangement::Dynamic);
    out.set_header(
        table
            .column_names()
            .iter()
            .map(|name| Cell::new(name).add_attribute(Attribute::Bold)),
    );
    for row in table.visible_rows() {
        out.add_row(row.iter().map(Cell::new));
    }

    println!("{out}");
    println!(
        "\n{} of {} rows shown",
        table.visible_row_count(),
        table.row_count()
    );
}

fn display_menu(view: &MenuView) {
    println!("Filter menu for '{}':", view.column);
    if view.search_enabled && !view.search_text.is_empty() {
        println!("  search: {}", view.search_text);
    }
    let mark = |checked: bool| if checked { "[x]" } else { "[ ]" };
    println!("  {} {}", mark(view.select_all_checked), view.select_all_label);
    for option in &view.options {
        println!("  {} {}", mark(option.checked), option.value);
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return Ok(());
    }
    if args.iter().any(|a| a == "--print-config") {
        print!("{}", Config::create_default_with_comments());
        return Ok(());
    }

    let options = parse_args(&args)?;
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: could not load config, using defaults: {}", e);
        Config::default()
    });
    let log_buffer = logging::init_tracing(&config.logging);

    let file = options
        .file
        .clone()
        .ok_or_else(|| anyhow!("No CSV file given (see --help)"))?;
    let mut table = load_csv(&file)?;
    let mut filter =
        HeaderFilter::with_columns(config.filter.clone(), table.column_names().to_vec());

    for (column, values) in &options.filters {
        filter.open(column, &table)?;
        for value in values {
            filter.dispatch(FilterCommand::toggle(value.clone(), true), &mut table)?;
        }
        filter.commit(&mut table)?;
    }
    for column in &options.clears {
        filter.open(column, &table)?;
        filter.clear(&mut table)?;
    }
    if let Some((column, ascending)) = &options.sort {
        filter.sort(column, *ascending, &mut table)?;
    }

    display_rows(&table);

    if let Some(column) = &options.menu {
        filter.open(column, &table)?;
        if let Some(text) = &options.search {
            filter.dispatch(FilterCommand::Search(text.clone()), &mut table)?;
        }
        if let Some(view) = filter.view() {
            println!();
            display_menu(&view);
        }
        filter.cancel()?;
    }

    if options.logs {
        println!();
        for entry in log_buffer.get_recent(config.logging.buffer_size) {
            println!("{}", entry.format_for_display());
        }
    }

    Ok(())
}
