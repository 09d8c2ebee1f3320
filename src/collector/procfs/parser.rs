//! Parsers for `/proc` filesystem files.
//!
//! These are pure functions that parse the content of various `/proc` files
//! into structured data. They are designed to be easily testable with string inputs.

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Raw counters of one `cpu`/`cpuN` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTicks {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
}

/// Parses the `cpu` line (aggregate, `cpu == None`) or the `cpuN` line of `/proc/stat`.
///
/// Format: `cpuN user nice system idle iowait irq softirq steal guest guest_nice`;
/// columns past `softirq` are not part of the accounting.
/// At least `user nice system idle` must be present; missing trailing
/// columns (old kernels) count as zero.
pub fn parse_cpu_ticks(content: &str, cpu: Option<usize>) -> Result<CpuTicks, ParseError> {
    let label = match cpu {
        Some(n) => format!("cpu{}", n),
        None => "cpu".to_string(),
    };

    let line = content
        .lines()
        .find(|line| line.split_whitespace().next() == Some(label.as_str()))
        .ok_or_else(|| ParseError::new(format!("missing '{}' line in stat", label)))?;

    let values = line
        .split_whitespace()
        .skip(1)
        .map(|v| {
            v.parse::<u64>()
                .map_err(|_| ParseError::new(format!("invalid counter '{}' in {}", v, label)))
        })
        .collect::<Result<Vec<u64>, ParseError>>()?;

    if values.len() < 4 {
        return Err(ParseError::new(format!(
            "not enough fields in {}: expected 4+, got {}",
            label,
            values.len()
        )));
    }

    let get = |idx: usize| values.get(idx).copied().unwrap_or(0);

    Ok(CpuTicks {
        user: get(0),
        nice: get(1),
        system: get(2),
        idle: get(3),
        iowait: get(4),
        irq: get(5),
        softirq: get(6),
    })
}

/// Number of logical CPUs named in `/proc/stat`: the highest `cpuN` index plus one.
///
/// Offline CPUs have no line of their own, so the lines cannot simply be counted.
pub fn count_cpus(content: &str) -> usize {
    content
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter_map(|label| label.strip_prefix("cpu")?.parse::<usize>().ok())
        .max()
        .map_or(0, |highest| highest + 1)
}

/// Finds a `key <u64>` line in `/proc/stat` (e.g. `ctxt` or `btime`).
pub fn parse_stat_value(content: &str, key: &str) -> Result<u64, ParseError> {
    for line in content.lines() {
        let mut parts = line.split_whitespace();
        if parts.next() == Some(key) {
            return parts
                .next()
                .ok_or_else(|| ParseError::new(format!("missing value for {}", key)))?
                .parse()
                .map_err(|_| ParseError::new(format!("invalid {}", key)));
        }
    }
    Err(ParseError::new(format!("missing '{}' line in stat", key)))
}

/// CPU accounting fields of `/proc/[pid]/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcTicks {
    /// Ticks scheduled in user mode (field 14).
    pub utime: u64,
    /// Ticks scheduled in kernel mode (field 15).
    pub stime: u64,
}

/// Parses the tick counters of `/proc/[pid]/stat`.
///
/// The comm field can contain spaces and parentheses, so scanning starts
/// after the last `)` in the line.
pub fn parse_proc_ticks(content: &str) -> Result<ProcTicks, ParseError> {
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;

    // fields[0] is the state, so field N of proc(5) is fields[N - 3].
    let fields: Vec<&str> = content[close_paren + 1..].split_whitespace().collect();

    let parse_field = |idx: usize, name: &str| -> Result<u64, ParseError> {
        fields
            .get(idx)
            .ok_or_else(|| ParseError::new(format!("missing field {}", name)))?
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    Ok(ProcTicks {
        utime: parse_field(11, "utime")?,
        stime: parse_field(12, "stime")?,
    })
}

/// Extracts the executable name from the first line of `/proc/[pid]/stat`.
///
/// The name is the text strictly between the first `(` and the last `)`.
pub fn parse_exe_name(content: &str) -> Option<String> {
    let line = content.lines().next()?;
    let start = line.find('(')? + 1;
    let end = line.rfind(')')?;
    if end < start {
        return None;
    }
    Some(line[start..end].to_string())
}

/// Converts the NUL separated argument vector of `/proc/[pid]/cmdline` into
/// a single display string. Returns `None` for an empty buffer (kernel threads).
pub fn parse_cmdline(raw: &[u8]) -> Option<String> {
    if raw.is_empty() {
        return None;
    }
    let bytes: Vec<u8> = raw.iter().map(|&b| if b == 0 { b' ' } else { b }).collect();
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
