/*!
# Golem DevKit - Stubs et fixtures pour les tests

Permet de tester le control plane sans hôte réel:
- `StubRunner`: réponses scriptées par préfixe de ligne de commande
- `StubFetcher`: scripts distants servis depuis la mémoire
- `fixtures`: sorties capturées de `golemsp` / `yagna` / `ps`
*/

pub mod fetcher_stub;
pub mod fixtures;
pub mod runner_stub;

pub use fetcher_stub::StubFetcher;
pub use runner_stub::{Detached, Reply, StubRunner};
