use anyhow::{Context, Result};
use quicklook::{AnnotationStore, DataId, ReviewMode};
use std::env;
use std::io::{self, BufRead, Write};
use std::process;

const TIPS: &str = "
G - Good centroid
B - Bad centroid

L - median per row lines
C - very visible crosstalk
F - Poor focus
D - Donut image
N - No target star marked!
A - Bad amp offsets!
V - No back bias?
P - Bad PSF (rotation/pointing/tracking error, earthquake, etc)
= - apply the same annotations as the previous image
";

fn print_usage(program: &str) {
    eprintln!("Exposure annotation tool");
    eprintln!();
    eprintln!("Usage: {} <output.json> <image>...", program);
    eprintln!();
    eprintln!("Walks the image list in order, prompting for a one-line annotation");
    eprintln!("per image. Filenames must carry dayObs-YYYY-MM-DD and seqNum-N");
    eprintln!("markers. Annotations are saved after every entry; type 'exit' to");
    eprintln!("stop early without losing anything.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --help, -h    Show this message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} tags.json renders/dayObs-2020-02-17-seqNum-*.png", program);
}

fn main() {
    env_logger::init();
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage(&args[0]);
        return Ok(());
    }
    if args.len() < 3 {
        print_usage(&args[0]);
        return Err(anyhow::anyhow!("Missing required arguments"));
    }

    let output_path = &args[1];
    let files = &args[2..];

    // Parse every filename up front so a typo fails before the session starts.
    let mut data_ids = Vec::with_capacity(files.len());
    for file in files {
        let id = DataId::from_filename(file)
            .with_context(|| format!("Bad image filename {}", file))?;
        data_ids.push(id);
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    let mut store = AnnotationStore::open(output_path)
        .with_context(|| format!("Failed to open annotation store {}", output_path))?;

    let mut mode = ReviewMode::Append;
    if !store.is_empty() {
        println!(
            "Output file {} exists with info on {} files:",
            output_path,
            store.len()
        );
        println!("Press A - view all images, appending info to existing entries");
        println!("Press O - view all images, overwriting existing entries");
        println!("Press S - skip all images with existing annotations, including blank annotations");
        println!("Press B - skip all images with annotations that are not blank");
        println!("Press D - just display existing data and exit");
        println!("Press Q to quit");

        mode = loop {
            let answer = read_line(&mut lines)?;
            match answer.chars().next().map(ReviewMode::from_key) {
                Some(Some(m)) => break m,
                Some(None) if answer.to_ascii_uppercase().starts_with('Q') => return Ok(()),
                _ => println!("Unrecognised response - try again"),
            }
        };

        if mode == ReviewMode::DumpAndExit {
            for (id, annotation) in store.iter() {
                println!("{}: {}", id, annotation);
            }
            return Ok(());
        }
    }

    println!("{}", TIPS);
    // Write the file up front, even when empty, so the output path is known
    // good before the operator invests time in the session.
    store.save()?;

    let mut previous: Option<String> = None;
    for id in data_ids {
        if let Some(existing) = store.get(&id) {
            if mode.skips(existing) {
                previous = Some(existing.to_string());
                continue;
            }
        }

        print!("{}: {}", id, store.get(&id).unwrap_or(""));
        io::stdout().flush()?;
        let answer = match read_line(&mut lines) {
            Ok(a) => a,
            Err(_) => break, // stdin closed; everything so far is saved
        };
        if answer.contains("exit") {
            break;
        }

        let annotation = if answer.contains('=') {
            previous
                .clone()
                .context("There is no previous annotation for the first image")?
        } else {
            answer
        };

        store.add(id.clone(), &annotation, mode)?;
        previous = store.get(&id).map(str::to_string);
    }

    println!("Info written to {}", output_path);
    Ok(())
}

fn read_line(lines: &mut impl Iterator<Item = io::Result<String>>) -> Result<String> {
    match lines.next() {
        Some(line) => Ok(line?),
        None => Err(anyhow::anyhow!("stdin closed")),
    }
}
