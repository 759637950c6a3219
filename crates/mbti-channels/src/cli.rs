use mbti_core::Mbti;
use mbti_core::channel::{Channel, ChannelError, ChannelMessage};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

/// Line-oriented channel over any async reader/writer pair; stdin/stdout by default.
#[derive(Debug)]
pub struct CliChannel<R = BufReader<Stdin>, W = Stdout> {
    reader: R,
    writer: W,
    prompt: String,
    reply_label: String,
    accumulated: String,
    streaming: bool,
}

impl CliChannel {
    /// Channel on the process's stdin and stdout.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::stdio()
    }
}

impl<R, W> CliChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    #[must_use]
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            prompt: "You: ".into(),
            reply_label: "Bot".into(),
            accumulated: String::new(),
            streaming: true,
        }
    }

    /// Prefix for replies, usually the selected persona code.
    pub fn set_reply_label(&mut self, label: impl Into<String>) {
        self.reply_label = label.into();
    }

    /// Print whole replies instead of streaming deltas.
    #[must_use]
    pub fn without_streaming(mut self) -> Self {
        self.streaming = false;
        self
    }

    #[cfg(test)]
    fn accumulated(&self) -> &str {
        &self.accumulated
    }

    #[cfg(test)]
    fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    async fn write_flush(&mut self, text: &str) -> Result<(), ChannelError> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

impl<R, W> Channel for CliChannel<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<Option<ChannelMessage>, ChannelError> {
        let prompt = self.prompt.clone();
        self.write_flush(&prompt).await?;

        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            tracing::debug!("input closed");
            return Ok(None);
        }
        self.accumulated.clear();

        let text = line.trim_end_matches(['\r', '\n']);
        if let Some(arg) = text.trim().strip_prefix("/persona ")
            && let Ok(code) = arg.parse::<Mbti>()
        {
            self.reply_label = code.to_string();
        }
        Ok(Some(ChannelMessage::new(text)))
    }

    async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
        let line = format!("{}: {text}\n", self.reply_label);
        self.write_flush(&line).await
    }

    async fn send_chunk(&mut self, chunk: &str) -> Result<(), ChannelError> {
        if self.accumulated.is_empty() {
            let label = format!("{}: ", self.reply_label);
            self.writer.write_all(label.as_bytes()).await?;
        }
        self.accumulated.push_str(chunk);
        self.write_flush(chunk).await
    }

    async fn flush_chunks(&mut self) -> Result<(), ChannelError> {
        if self.accumulated.is_empty() {
            return Ok(());
        }
        self.accumulated.clear();
        self.write_flush("\n").await
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(input: &str) -> CliChannel<&[u8], Vec<u8>> {
        CliChannel::new(input.as_bytes(), Vec::new())
    }

    fn output(ch: CliChannel<&[u8], Vec<u8>>) -> String {
        String::from_utf8(ch.into_inner().1).unwrap()
    }

    #[tokio::test]
    async fn recv_reads_lines_until_eof() {
        let mut ch = channel("hello\r\nsecond line\n");
        assert_eq!(ch.recv().await.unwrap().unwrap().text, "hello");
        assert_eq!(ch.recv().await.unwrap().unwrap().text, "second line");
        assert!(ch.recv().await.unwrap().is_none());
        assert_eq!(output(ch), "You: You: You: ");
    }

    #[tokio::test]
    async fn blank_lines_are_passed_through() {
        let mut ch = channel("\n");
        assert_eq!(ch.recv().await.unwrap().unwrap().text, "");
    }

    #[tokio::test]
    async fn send_prefixes_label() {
        let mut ch = channel("");
        ch.send("Persona set to INFP.").await.unwrap();
        assert_eq!(output(ch), "Bot: Persona set to INFP.\n");
    }

    #[tokio::test]
    async fn persona_command_updates_label() {
        let mut ch = channel("/persona enfp\n");
        ch.recv().await.unwrap();
        ch.send("hey").await.unwrap();
        assert!(output(ch).ends_with("ENFP: hey\n"));
    }

    #[tokio::test]
    async fn invalid_persona_keeps_label() {
        let mut ch = channel("/persona nope\n");
        ch.recv().await.unwrap();
        ch.send("x").await.unwrap();
        assert!(output(ch).ends_with("Bot: x\n"));
    }

    #[tokio::test]
    async fn chunks_accumulate_and_flush_once() {
        let mut ch = channel("");
        ch.set_reply_label("INTJ");
        ch.send_chunk("hello").await.unwrap();
        ch.send_chunk(" world").await.unwrap();
        assert_eq!(ch.accumulated(), "hello world");
        ch.flush_chunks().await.unwrap();
        ch.flush_chunks().await.unwrap();
        assert!(ch.accumulated().is_empty());
        assert_eq!(output(ch), "INTJ: hello world\n");
    }

    #[test]
    fn streaming_toggle() {
        assert!(channel("").supports_streaming());
        assert!(!channel("").without_streaming().supports_streaming());
    }
}
