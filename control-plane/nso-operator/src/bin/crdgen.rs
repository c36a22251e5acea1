use kube::core::CustomResourceExt;
use nso_operator::crd::{nso::NSO, package_bundle::PackageBundle};

fn main() -> anyhow::Result<()> {
    let docs = [
        serde_yaml::to_string(&NSO::crd())?,
        serde_yaml::to_string(&PackageBundle::crd())?,
    ];
    println!("{}", docs.join("---\n"));
    Ok(())
}
