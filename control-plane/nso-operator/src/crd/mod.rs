pub mod nso;
pub mod package_bundle;

pub const GROUP: &str = "orchestration.cisco.com";
pub const VERSION: &str = "v1alpha1";

#[cfg(test)]
mod tests {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::{CustomResourceExt, Resource};

    use super::*;
    use nso::NSO;
    use package_bundle::PackageBundle;

    #[test]
    fn both_kinds_share_group_and_version() {
        let api_version = format!("{GROUP}/{VERSION}");
        assert_eq!(NSO::api_version(&()), api_version);
        assert_eq!(PackageBundle::api_version(&()), api_version);
    }

    #[test]
    fn only_bundles_carry_a_status_subresource() {
        let status = |crd: CustomResourceDefinition| {
            crd.spec.versions[0]
                .subresources
                .as_ref()
                .and_then(|s| s.status.as_ref())
                .is_some()
        };
        assert!(!status(NSO::crd()));
        assert!(status(PackageBundle::crd()));
        assert_eq!(NSO::crd().spec.names.short_names, Some(vec!["nso".into()]));
    }
}
