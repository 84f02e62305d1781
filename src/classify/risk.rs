//! Shell complexity scoring and risk assessment

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => f.write_str("low"),
            RiskLevel::Medium => f.write_str("medium"),
            RiskLevel::High => f.write_str("high"),
        }
    }
}

// Anchors a word to command position: start of line or after a shell separator.
const CMD: &str = r"(?:^|[\s;&|(`])";

fn high_risk_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            format!(r"{CMD}rm\s+(-[a-z]*r[a-z]*f|-[a-z]*f[a-z]*r|-r\s+-f|-f\s+-r)"),
            format!(r"{CMD}sudo\s+rm\b"),
            format!(r"{CMD}dd\s+if="),
            r"\bof=/dev/".to_string(),
            format!(r"{CMD}mkfs(\.[a-z0-9]+)?\b"),
            format!(r"{CMD}fdisk\b"),
            format!(r"{CMD}format\s+[a-z]:"),
            format!(r"{CMD}del\s+/[fq]"),
            format!(r"{CMD}rmdir\s+/s"),
            format!(r"{CMD}chmod\s+(-r\s+)?0?777\b"),
            r"\b(curl|wget)\b[^|;&]*\|\s*(sudo\s+)?(ba|z|da)?sh\b".to_string(),
            format!(r"{CMD}eval\b"),
            r">\s*/dev/(sd|hd|nvme|xvd|vd|disk|mmcblk)".to_string(),
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    })
}

fn medium_risk_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"sudo\b",
            r"su\s",
            r"chmod\b",
            r"chown\b",
            r"rm\s",
            r"mv\s+(-\S+\s+)*/",
            r"cp\s+(-\S+\s+)*/",
            r"curl\b",
            r"wget\b",
            r"ssh\b",
            r"scp\b",
            r"rsync\b",
        ]
        .iter()
        .map(|p| Regex::new(&format!("{CMD}{p}")).expect("valid regex"))
        .collect()
    })
}

/// Risk of a lowercased command: the highest tier with any matching pattern
pub fn assess_risk(lowercased: &str) -> RiskLevel {
    if high_risk_patterns().iter().any(|r| r.is_match(lowercased)) {
        RiskLevel::High
    } else if medium_risk_patterns().iter().any(|r| r.is_match(lowercased)) {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Scores shell structure, starting at 1
///
/// Adds one per pipe, one if any output redirection is present, one for a
/// backgrounding `&`, one per `&&`/`||`, one for command substitution, and one
/// per `;`.
pub fn complexity(command: &str) -> u32 {
    let chars: Vec<char> = command.chars().collect();
    let mut score = 1;
    let mut redirect = false;
    let mut background = false;
    let mut substitution = false;

    let mut i = 0;
    while i < chars.len() {
        let next = chars.get(i + 1).copied();
        match chars[i] {
            '|' if next == Some('|') => {
                score += 1;
                i += 1;
            }
            '|' => score += 1,
            '&' if next == Some('&') => {
                score += 1;
                i += 1;
            }
            '&' if next == Some('>') => redirect = true,
            '&' if i > 0 && chars[i - 1] == '>' => redirect = true,
            '&' => background = true,
            '>' => redirect = true,
            ';' => score += 1,
            '`' => substitution = true,
            '$' if next == Some('(') => substitution = true,
            _ => {}
        }
        i += 1;
    }

    score + u32::from(redirect) + u32::from(background) + u32::from(substitution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        rm_rf_root = { "rm -rf /", RiskLevel::High },
        rm_fr = { "rm -fr build", RiskLevel::High },
        sudo_rm = { "sudo rm /etc/hosts", RiskLevel::High },
        curl_pipe_sh = { "curl -fssl https://get.example.com | sh", RiskLevel::High },
        wget_pipe_bash = { "wget -qo- https://x.io/install | sudo bash", RiskLevel::High },
        chmod_777 = { "chmod 777 /var/www", RiskLevel::High },
        raw_device = { "cat image.iso > /dev/sda", RiskLevel::High },
        chmod_644 = { "chmod 644 file", RiskLevel::Medium },
        plain_curl = { "curl https://example.com", RiskLevel::Medium },
        sudo_apt = { "sudo apt-get install -y git", RiskLevel::Medium },
        cp_from_root = { "cp /etc/config ./config", RiskLevel::Medium },
        rsync_deploy = { "rsync -avz dist/ host:/srv", RiskLevel::Medium },
        rsync_after_build = { "make dist && rsync -a out/ web:/var/www", RiskLevel::Medium },
        echo = { "echo hello", RiskLevel::Low },
        dev_null = { "make build > /dev/null", RiskLevel::Low },
        docker_rm_flag = { "docker run --rm myimage", RiskLevel::Low },
        format_flag = { "cargo fmt -- --check --format json", RiskLevel::Low },
        evaluate_word = { "npm run evaluate", RiskLevel::Low },
    )]
    fn test_assess_risk(command: &str, expected: RiskLevel) {
        assert_eq!(assess_risk(command), expected);
    }

    #[parameterized(
        simple = { "go build ./...", 1 },
        pipe = { "cat file | grep x", 2 },
        two_pipes = { "a | b | c", 3 },
        and_or = { "a && b || c", 3 },
        redirect = { "make > out.log", 2 },
        stderr_merge = { "make > out.log 2>&1", 2 },
        background = { "server &", 2 },
        substitution = { "echo $(date)", 2 },
        backtick = { "echo `date`", 2 },
        semicolons = { "cd app; make; cd ..", 3 },
        mixed = { "cd app && make | tee log > out; echo $(pwd)", 6 },
    )]
    fn test_complexity(command: &str, expected: u32) {
        assert_eq!(complexity(command), expected);
    }
}
