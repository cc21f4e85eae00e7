/// Posture applied when the scanning daemon is unreachable or errors.
///
/// This is a deployment-time policy, not a per-call choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPosture {
    /// Scanning is skipped entirely; verdicts report the scanner as unavailable.
    Disabled,
    /// Scan failures are treated as clean but flagged so callers can alert.
    FailOpen,
    /// Scan failures reject the upload.
    FailClosed,
}

/// Result of a single scan attempt. Gates pipeline progression; never persisted.
#[derive(Debug, Clone)]
pub struct ScanVerdict {
    pub infected: bool,
    pub signatures: Vec<String>,
    pub scanner_available: bool,
    pub error: Option<String>,
}

impl ScanVerdict {
    pub fn clean() -> Self {
        Self {
            infected: false,
            signatures: Vec::new(),
            scanner_available: true,
            error: None,
        }
    }

    pub fn infected(signatures: Vec<String>) -> Self {
        Self {
            infected: true,
            signatures,
            scanner_available: true,
            error: None,
        }
    }

    /// Daemon unreachable or scan errored: the posture decides whether this
    /// verdict reads as clean (fail-open) or infected (fail-closed).
    pub fn unavailable(error: impl Into<String>, posture: ScanPosture) -> Self {
        Self {
            infected: posture == ScanPosture::FailClosed,
            signatures: Vec::new(),
            scanner_available: false,
            error: Some(error.into()),
        }
    }

    /// Scanning disabled by configuration.
    pub fn skipped() -> Self {
        Self {
            infected: false,
            signatures: Vec::new(),
            scanner_available: false,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_fail_open_is_clean() {
        let v = ScanVerdict::unavailable("connection refused", ScanPosture::FailOpen);
        assert!(!v.infected);
        assert!(!v.scanner_available);
        assert!(v.error.is_some());
    }

    #[test]
    fn test_unavailable_fail_closed_is_infected() {
        let v = ScanVerdict::unavailable("timeout", ScanPosture::FailClosed);
        assert!(v.infected);
        assert!(!v.scanner_available);
    }

    #[test]
    fn test_infected_carries_signatures() {
        let v = ScanVerdict::infected(vec!["Eicar-Test-Signature".to_string()]);
        assert!(v.infected);
        assert_eq!(v.signatures.len(), 1);
        assert!(v.scanner_available);
    }
}
