//! Command-executor boundary
//!
//! The debug-port engine itself is an external collaborator: the pipeline
//! only ever sees it as a byte-buffer-in/byte-buffer-out call. The trait
//! mirrors that contract; a loopback stand-in keeps the binary and the
//! tests runnable without probe hardware.

/// Executes one tunneled command packet
pub trait CommandExecutor: Send {
    /// Process a command packet, writing the reply into `response`
    ///
    /// The response length is returned in the low 16 bits of the result;
    /// the high bits are reserved by the engine and ignored here.
    fn process_command(&mut self, request: &[u8], response: &mut [u8]) -> u32;
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for Box<E> {
    fn process_command(&mut self, request: &[u8], response: &mut [u8]) -> u32 {
        (**self).process_command(request, response)
    }
}

/// Stand-in executor that echoes every request back
///
/// Takes the place of the real debug-port engine when none is wired in.
#[derive(Debug, Default)]
pub struct LoopbackExecutor;

impl CommandExecutor for LoopbackExecutor {
    fn process_command(&mut self, request: &[u8], response: &mut [u8]) -> u32 {
        let n = request.len().min(response.len());
        response[..n].copy_from_slice(&request[..n]);
        n as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_echoes() {
        let mut exec = LoopbackExecutor;
        let mut response = [0u8; 8];
        let len = exec.process_command(&[5, 4, 3], &mut response);
        assert_eq!(len & 0xFFFF, 3);
        assert_eq!(&response[..3], &[5, 4, 3]);
    }

    #[test]
    fn test_loopback_caps_to_response_buffer() {
        let mut exec = LoopbackExecutor;
        let mut response = [0u8; 2];
        let len = exec.process_command(&[1, 2, 3, 4], &mut response);
        assert_eq!(len, 2);
    }
}
