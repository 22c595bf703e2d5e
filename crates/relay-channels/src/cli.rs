use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout,
};

use relay_core::channel::{Channel, ChannelError, ChannelMessage};

const PROMPT: &str = ">>> ";

/// Line-oriented terminal channel: one input line per turn, replies on stdout.
pub struct CliChannel<R = BufReader<Stdin>, W = Stdout> {
    lines: Lines<R>,
    out: W,
}

impl CliChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::from_io(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: AsyncBufRead + Unpin, W> CliChannel<R, W> {
    pub fn from_io(reader: R, out: W) -> Self {
        Self {
            lines: reader.lines(),
            out,
        }
    }
}

impl<R, W> std::fmt::Debug for CliChannel<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CliChannel").finish_non_exhaustive()
    }
}

impl<R, W> Channel for CliChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Option<ChannelMessage>, ChannelError> {
        self.out.write_all(PROMPT.as_bytes()).await?;
        self.out.flush().await?;

        match self.lines.next_line().await? {
            Some(line) => Ok(Some(ChannelMessage { text: line })),
            None => {
                tracing::debug!("stdin reached EOF");
                self.out.write_all(b"\n").await?;
                self.out.flush().await?;
                Ok(None)
            }
        }
    }

    async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;
        Ok(())
    }
}
