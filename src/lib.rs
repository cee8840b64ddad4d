#![warn(missing_docs)]
#![doc(test(no_crate_inject))]
#![doc(test(attr(deny(unused, future_incompatible))))]

//! This crate discovers every minimal, non-trivial functional dependency (FD) of a relation, using
//! the hybrid sampling-plus-validation approach described in:
//!
//! - Papenbrock and Naumann, [A Hybrid Approach to Functional Dependency Discovery][hyfd], 2016
//!
//! [hyfd]: https://doi.org/10.1145/2882903.2915203
//!
//! An FD `X -> A` holds if any two rows that agree on every column in `X` also agree on `A`. It is
//! minimal if no proper subset of `X` determines `A`, and non-trivial if `A` is not in `X`.
//!
//! Discovery alternates between two cheap-but-incomplete and expensive-but-exact phases. The
//! sampler compares a small number of row pairs and records the sets of columns they agree on.
//! Each such agree set proves that it determines nothing outside itself, so those non-FDs are
//! folded into a prefix tree of candidates (an [`FdTree`]) by specializing every candidate they
//! contradict. The validator then checks the candidates against the whole relation, one lattice
//! level at a time, using position list indexes ([`Pli`]). Whenever validation starts
//! discarding many candidates, it hands the violating row pairs back to the sampler and the
//! cycle repeats.
//!
//! ```
//! use agree_lattice::{discover_fds, DelimitedStream, DiscoveryConfig, Relation};
//!
//! let csv = b"a,b,c\n1,x,p\n1,x,q\n2,y,p\n".to_vec();
//! let mut stream = DelimitedStream::new("demo", csv, b',', true)?;
//! let config = DiscoveryConfig::default();
//! let relation = Relation::load(&mut stream, config.null_policy)?;
//! let fds = discover_fds(&relation, &config)?;
//!
//! let names = relation.column_names();
//! for fd in &fds {
//!     println!("{}", fd.display_with(&names));
//! }
//! assert_eq!(fds.len(), 2);
//! # Ok::<(), agree_lattice::Error>(())
//! ```

pub use fixedbitset;

pub mod column;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fd_tree;
pub mod inductor;
pub mod input;
pub mod pli;
pub mod pool;
pub mod preprocess;
pub mod relation;
pub mod sampler;
pub mod validator;

pub use column::{ColumnType, TypedColumn, Value};
pub use config::DiscoveryConfig;
pub use discovery::{discover_fds, Discovery, FunctionalDependency};
pub use error::{Error, Result};
pub use fd_tree::FdTree;
pub use input::{DelimitedStream, InMemoryTable, TabularStream};
pub use pli::{Pli, SINGLETON_CLUSTER};
pub use pool::WorkerPool;
pub use relation::{ColumnValueIds, NullPolicy, Relation, NULL_VALUE_ID};
