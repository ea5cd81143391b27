use reelquest::config::{load_config, WarehouseKind};
use reelquest::discovery::Discovery;
use reelquest::query::FilterSet;
use reelquest::warehouse::SqliteWarehouse;
use std::env;
use std::fs::File;
use std::io::Write;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run --bin catalogue_explorer -- --stats");
    eprintln!("  cargo run --bin catalogue_explorer -- --search <title prefix> [--genre G] [--language L]");
    eprintln!("                                        [--years FROM TO] [--min-rating R] [--out file]");
    eprintln!("  cargo run --bin catalogue_explorer -- --init-sqlite   (create empty tables at sqlite_path)");
}

/// Value following `flag`. Another `--flag` in that position means the value is missing.
fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
        .filter(|v| !v.starts_with("--"))
}

fn parse_or_exit<T: std::str::FromStr>(raw: &str, what: &str) -> T {
    raw.parse().unwrap_or_else(|_| {
        eprintln!("Invalid {what}: {raw}");
        std::process::exit(1);
    })
}

fn filters_from_args(args: &[String]) -> FilterSet {
    let mut f = FilterSet::title(arg_after(args, "--search").unwrap_or_default());
    if let Some(g) = arg_after(args, "--genre") {
        f = f.with_genre(g);
    }
    if let Some(l) = arg_after(args, "--language") {
        f = f.with_language(l);
    }
    if let Some(i) = args.iter().position(|a| a == "--years") {
        match (args.get(i + 1), args.get(i + 2)) {
            (Some(a), Some(b)) => {
                f = f.with_years(parse_or_exit(a, "year"), parse_or_exit(b, "year"));
            }
            _ => {
                eprintln!("--years needs FROM and TO");
                std::process::exit(1);
            }
        }
    }
    if let Some(r) = arg_after(args, "--min-rating") {
        f = f.with_min_rating(parse_or_exit(r, "rating"));
    }
    f
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let args: Vec<String> = env::args().collect();
    if args.len() == 1 || args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let cfg = load_config();

    if args.iter().any(|a| a == "--init-sqlite") {
        if cfg.warehouse != WarehouseKind::Sqlite {
            eprintln!("--init-sqlite only applies to the sqlite warehouse");
            std::process::exit(1);
        }
        if let Some(dir) = cfg.sqlite_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        SqliteWarehouse::open(&cfg.sqlite_path)?;
        println!("Tables ready in {}", cfg.sqlite_path.display());
        return Ok(());
    }

    println!("Opening {:?} warehouse", cfg.warehouse);
    let discovery = Discovery::from_config(&cfg)?;

    let mut output = String::new();

    if args.iter().any(|a| a == "--search") {
        let filters = filters_from_args(&args);
        let rows = discovery.search(&filters);
        output.push_str(&format!("--- Search: {:?} ---\n", filters));
        output.push_str(&format!("{} titles\n", rows.len()));
        for r in rows.iter() {
            output.push_str(&format!("{:>4.1}  {}\n", r.display_rating(), r.title));
        }
    } else {
        let Some(stats) = discovery.stats() else {
            for n in discovery.notices().drain() {
                eprintln!("{}", n.display_line());
            }
            std::process::exit(1);
        };
        output.push_str(&format!("--- Catalogue: {} movies ---\n", stats.total));
        output.push_str("By language:\n");
        for (lang, n) in &stats.by_language {
            output.push_str(&format!("  {lang:<8} {n}\n"));
        }
        output.push_str("By primary genre:\n");
        for (genre, n) in &stats.by_primary_genre {
            output.push_str(&format!("  {genre:<20} {n}\n"));
        }
    }

    for n in discovery.notices().drain() {
        eprintln!("{}", n.display_line());
    }

    if let Some(path) = arg_after(&args, "--out") {
        let mut file = File::create(path)?;
        file.write_all(output.as_bytes())?;
        println!("Exported results to {}", path);
    } else {
        print!("{}", output);
    }

    Ok(())
}
