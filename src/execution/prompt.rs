use crate::models::Side;
use async_trait::async_trait;
use std::io::{self, BufRead, Write};

pub const BUY_CHOICE: &str = "BUY in at markdown (need units to trade)";
pub const SELL_CHOICE: &str = "SELL out at markup (need liquidity)";

/// Asks the operator which side to open with on a cold start
#[async_trait]
pub trait SidePrompt: Send {
    /// `Ok(None)` means the operator aborted
    async fn choose_side(&mut self) -> io::Result<Option<Side>>;
}

/// Numbered two-choice menu over any line reader
pub struct LinePrompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> LinePrompt<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn render(&mut self) -> io::Result<()> {
        writeln!(self.output, "No open order found. Choose how to start:")?;
        writeln!(self.output, "  1) {}", BUY_CHOICE)?;
        writeln!(self.output, "  2) {}", SELL_CHOICE)?;
        write!(self.output, "Selection (empty to quit): ")?;
        self.output.flush()
    }

    /// Show the menu until the operator picks a side or gives up
    pub fn ask(&mut self) -> io::Result<Option<Side>> {
        loop {
            self.render()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                // EOF
                writeln!(self.output)?;
                return Ok(None);
            }

            match parse_choice(&line) {
                Choice::Abort => return Ok(None),
                Choice::Side(side) => return Ok(Some(side)),
                Choice::Invalid => {
                    writeln!(self.output, "'{}' is not a valid choice", line.trim())?;
                }
            }
        }
    }
}

#[async_trait]
impl<R, W> SidePrompt for LinePrompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    async fn choose_side(&mut self) -> io::Result<Option<Side>> {
        self.ask()
    }
}

/// The menu on the terminal
///
/// Stdin is read on a detached thread so the runtime stays free to react
/// to Ctrl+C; an abandoned read dies with the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

#[async_trait]
impl SidePrompt for StdinPrompt {
    async fn choose_side(&mut self) -> io::Result<Option<Side>> {
        let (tx, rx) = tokio::sync::oneshot::channel();

        std::thread::Builder::new()
            .name("side-prompt".to_string())
            .spawn(move || {
                let mut prompt = LinePrompt::new(io::stdin().lock(), io::stdout());
                let _ = tx.send(prompt.ask());
            })?;

        rx.await
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "prompt thread exited"))?
    }
}

enum Choice {
    Side(Side),
    Abort,
    Invalid,
}

fn parse_choice(line: &str) -> Choice {
    let answer = line.trim();
    if answer.is_empty() {
        return Choice::Abort;
    }

    match answer {
        "1" => Choice::Side(Side::Buy),
        "2" => Choice::Side(Side::Sell),
        other => other.parse().map(Choice::Side).unwrap_or(Choice::Invalid),
    }
}
