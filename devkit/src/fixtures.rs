/*!
Sorties capturées des CLI `golemsp`, `yagna` et `ps`
*/

pub const STATUS_RUNNING: &str = "\
\x1b[1mStatus\x1b[0m
  Service    \x1b[32mis running\x1b[0m
  Version    0.15.2
  Commit     8b1f5d4c
  Date       2024-06-11
  Build      402

  Node Name  pure-alley
  Subnet     public
  VM         \x1b[32mvalid\x1b[0m

  network          mainnet
  amount (total)   1.25 GLM
      (on-chain)   0.25 GLM
      (polygon)    1.00 GLM

  pending          0.10 GLM (2)
  issued           0.05 GLM (1)
";

pub const STATUS_NOT_RUNNING: &str = "\
Status
  Service    is not running
  Version    0.15.2
  Commit     8b1f5d4c
  Date       2024-06-11
  Build      402

  Node Name  pure-alley
  Subnet     public
  VM         valid
";

pub const SETTINGS_SHOW: &str = r#"
Shared resource setup:
        cores:  7
        memory: 12.5 GiB
        disk:   100 GiB

Pricing for preset "vm":
        0.025 GLM per cpu hour
        0.005 GLM per hour
        0 GLM for start

Pricing for preset "wasmtime":
        0.1 GLM per cpu hour
        0.02 GLM per hour
        0 GLM for start

Wallet:
        account: 0x63fc2ad3d021a4af7e1a71b9a3e1d1c2a7b2d1ff
"#;

pub const ID_SHOW: &str = "\
nodeId: 0x2f5c8a1e0b9d4c7e6a3f1b2d8e9c0a4b5d6e7f80
alias: null
deleted: false
isDefault: true
isLocked: false
";

pub const PS_OUTPUT: &str = "\
    ELAPSED COMMAND
   12:03:44 /sbin/init splash
   01:05:12 golemsp run
   01:05:10 /home/golem/.local/bin/yagna service run
";

/// Contenu de script distant marqué par son nom, pour `StubRunner::on_script`
pub fn script(name: &str) -> String {
    format!("#!/bin/bash\n# {name}\necho \"{name} done\"\n")
}
