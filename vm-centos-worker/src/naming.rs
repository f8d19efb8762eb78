//! Conversion between CentOS versions and the OVA files that contain them.
//!
//! OVA files follow the `CentOS-<version>.ova` convention, e.g. `CentOS-7.ova`.
//! Images with a GUI are named `CentOS-desktop-<version>.ova`.

const OVA_SUFFIX: &str = ".ova";

/// Name of the OVA file holding `version`.
pub fn image_file_name(version: &str, desktop: bool) -> String {
    if desktop {
        format!("CentOS-desktop-{}{}", version, OVA_SUFFIX)
    } else {
        format!("CentOS-{}{}", version, OVA_SUFFIX)
    }
}

/// Version contained in the OVA file `file_name`.
///
/// Takes the token after the last `-` and drops the `.ova` suffix, so the
/// desktop and server images of one version map to the same string.
pub fn image_version(file_name: &str) -> String {
    file_name
        .rsplit('-')
        .next()
        .unwrap_or(file_name)
        .replace(OVA_SUFFIX, "")
}
