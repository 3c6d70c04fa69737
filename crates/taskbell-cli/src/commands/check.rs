//! Validate a task snapshot file.
//!
//! Runs each snapshot entry through the same normalization the engine
//! applies at ingestion and reports what would be kept or skipped.

use std::path::Path;

use taskbell_core::TaskInput;

pub fn run(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(file)?;
    let inputs: Vec<TaskInput> = serde_json::from_str(&raw)?;

    let mut valid = 0usize;
    let mut invalid = 0usize;
    for input in &inputs {
        match input.normalize() {
            Ok(task) => {
                valid += 1;
                println!(
                    "ok   {}  {:?}  {} -> {}  \"{}\"",
                    task.id, task.priority, task.start, task.end, task.title
                );
            }
            Err(e) => {
                invalid += 1;
                println!("bad  {}  {e}", input.id);
            }
        }
    }
    println!("{valid} valid, {invalid} invalid");

    if invalid > 0 {
        std::process::exit(1);
    }
    Ok(())
}
