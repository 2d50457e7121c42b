//! Terminal output helpers

use colored::Colorize;
use std::io::Write;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const SPINNER_FRAMES: [&str; 4] = ["|", "/", "-", "\\"];
const SPINNER_PERIOD: Duration = Duration::from_millis(500);

/// Print an answer from the service
pub fn print_answer(answer: &str) {
    println!("{}", answer.trim_end());
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a prompt without a trailing newline
pub fn print_prompt(prompt: &str) {
    print!("{} ", prompt.bold());
    let _ = std::io::stdout().flush();
}

/// Progress indicator shown while a query is in flight
pub struct Spinner {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl Spinner {
    pub fn start(label: &'static str) -> Self {
        let (stop, mut stopped) = oneshot::channel();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SPINNER_PERIOD);
            let mut frame = 0usize;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        print!("\r{} {}", label, SPINNER_FRAMES[frame].cyan());
                        let _ = std::io::stdout().flush();
                        frame = (frame + 1) % SPINNER_FRAMES.len();
                    }
                    _ = &mut stopped => break,
                }
            }
            print!("\r\x1b[K");
            let _ = std::io::stdout().flush();
        });

        Self {
            stop: Some(stop),
            handle,
        }
    }

    /// Stop the spinner and clear its line
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = (&mut self.handle).await;
    }
}
