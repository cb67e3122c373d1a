use anyhow::Result;
use prism_subpocket::{BoundaryMesh, Group, SphereSet};

#[test]
fn file_round_trip_preserves_rows() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("lig_p0_sp1.xyzrg");

    let set = SphereSet::from_xyzrg(&[
        [1.25, -3.5, 0.125, 1.4, 1.0],
        [0.1, 0.2, 0.3, 3.4, -2.0],
        [10.0 / 3.0, 1e-7, -42.0, 1.7, 0.0],
    ])?;
    set.write_xyzrg_file(&path, false)?;

    let loaded = SphereSet::from_xyzrg_file(&path)?;
    assert_eq!(loaded.xyzrg(), set.xyzrg());
    assert_eq!(loaded.name(), Some("lig_p0_sp1"));
    assert_eq!(
        loaded.groups(),
        vec![Group::Resolved(1), Group::Pending(2), Group::Ungrouped]
    );
    Ok(())
}

#[test]
fn mesh_is_written_alongside() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("pocket.xyzrg");

    let mesh = BoundaryMesh::from_triangles(
        vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        vec![[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
    )?;
    let set = SphereSet::from_xyzr(&[[0.2, 0.2, 0.2, 0.1]], None)?.with_mesh(mesh);
    set.write_xyzrg_file(&path, true)?;

    let obj = std::fs::read_to_string(dir.path().join("pocket.obj"))?;
    assert_eq!(obj.lines().filter(|l| l.starts_with("v ")).count(), 4);
    assert_eq!(obj.lines().filter(|l| l.starts_with("f ")).count(), 4);
    Ok(())
}
