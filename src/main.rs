use colored::Colorize;

fn main() {
    if let Err(e) = phaselock::run() {
        eprintln!("{} [{}] {}", "error:".red().bold(), e.code(), e);
        if let Some(rule) = e.rule() {
            eprintln!("{} {}", "rule:".yellow(), rule);
        }
        std::process::exit(1);
    }
}
