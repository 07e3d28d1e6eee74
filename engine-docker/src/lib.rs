mod docker;

pub use docker::DockerEngine;
