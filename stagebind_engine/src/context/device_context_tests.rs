//! Unit tests for device_context.rs

use std::sync::Arc;
use crate::binding::pipeline::{Pipeline, PipelineDesc};
use crate::binding::shader_resource_binding::ShaderResourceBinding;
use crate::binding::usage_state::ResourceState;
use crate::config::Config;
use crate::context::device_context::{
    ContextKind, DeviceContext, ResourceStateTransitionMode, StateTransition, VertexStream,
};
use crate::context::mock_native_context::{MockNativeContext, MockProbe, NativeCall};
use crate::context::native_context::{DispatchAttribs, DrawAttribs, DrawIndexedAttribs, IndexFormat};
use crate::device::{
    BindFlags, BufferViewType, DeviceObject, TextureDesc, TextureViewType,
};
use crate::error::Error;
use crate::log::LogSeverity;
use crate::shader::{ResourceKind, ShaderDesc, ShaderResourceDesc, ShaderStage, SlotKind, VariableClass};
use crate::test_support::{capture_logs, Fixture};
use serial_test::serial;

/// Vertex shader with one constant buffer; pixel shader with a texture
/// array, a sampler, a constant buffer at slot 2 and a dynamic UAV
fn graphics_pipeline(fx: &Fixture, texture_count: u32) -> Arc<Pipeline> {
    let vs = fx
        .device
        .create_shader(
            ShaderDesc::new("vs", ShaderStage::Vertex)
                .with_resource(ShaderResourceDesc::new("cbFrame", ResourceKind::ConstantBuffer, 0)),
        )
        .unwrap();
    let ps = fx
        .device
        .create_shader(
            ShaderDesc::new("ps", ShaderStage::Pixel)
                .with_resource(ShaderResourceDesc::new("g_Textures", ResourceKind::TextureSrv, 0).with_count(texture_count))
                .with_resource(ShaderResourceDesc::new("g_Sampler", ResourceKind::Sampler, 0))
                .with_resource(ShaderResourceDesc::new("cbParams", ResourceKind::ConstantBuffer, 2))
                .with_resource(ShaderResourceDesc::new("g_Output", ResourceKind::BufferUav, 0).with_class(VariableClass::Dynamic)),
        )
        .unwrap();
    let name = format!("graphics_{}", texture_count);
    Arc::new(fx.device.create_pipeline(PipelineDesc::new(name).with_shader(vs).with_shader(ps)).unwrap())
}

fn compute_pipeline(fx: &Fixture) -> Arc<Pipeline> {
    let cs = fx
        .device
        .create_shader(
            ShaderDesc::new("cs", ShaderStage::Compute)
                .with_resource(ShaderResourceDesc::new("g_Input", ResourceKind::BufferSrv, 0))
                .with_resource(ShaderResourceDesc::new("g_Target", ResourceKind::BufferUav, 0)),
        )
        .unwrap();
    Arc::new(fx.device.create_pipeline(PipelineDesc::new("compute").with_shader(cs)).unwrap())
}

fn immediate(fx: &Fixture) -> (DeviceContext, MockProbe) {
    let (native, probe) = MockNativeContext::new(false);
    (fx.device.create_immediate_context(Box::new(native)), probe)
}

fn deferred(fx: &Fixture) -> (DeviceContext, MockProbe) {
    let (native, probe) = MockNativeContext::new(true);
    (fx.device.create_deferred_context(Box::new(native)), probe)
}

fn bind(srb: &mut ShaderResourceBinding, stage: ShaderStage, name: &str, object: impl Into<DeviceObject>) {
    srb.variable_by_name(stage, name).unwrap().set(object);
}

fn bind_at(srb: &mut ShaderResourceBinding, stage: ShaderStage, name: &str, index: u32, object: impl Into<DeviceObject>) {
    srb.variable_by_name(stage, name).unwrap().set_array(&[object.into()], index);
}

// ============================================================================
// COMMIT PASS TESTS
// ============================================================================

#[test]
fn test_scattered_changes_commit_as_one_range() {
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 4);
    let mut srb = pipeline.create_shader_resource_binding(false).unwrap();
    let first = fx.texture_srv("first");
    let last = fx.texture_srv("last");
    bind_at(&mut srb, ShaderStage::Pixel, "g_Textures", 1, first.clone());
    bind_at(&mut srb, ShaderStage::Pixel, "g_Textures", 3, last.clone());

    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);

    let calls = probe.set_slot_calls(ShaderStage::Pixel, SlotKind::ShaderResource);
    assert_eq!(
        calls,
        vec![NativeCall::SetSlots {
            stage: ShaderStage::Pixel,
            kind: SlotKind::ShaderResource,
            start_slot: 1,
            handles: vec![Some(first.native_handle()), None, Some(last.native_handle())],
        }]
    );
    // Nothing bound elsewhere, nothing issued elsewhere
    assert!(probe.set_slot_calls(ShaderStage::Vertex, SlotKind::ConstantBuffer).is_empty());
    assert!(probe.set_slot_calls(ShaderStage::Pixel, SlotKind::Sampler).is_empty());

    let stats = ctx.stats();
    assert_eq!(stats.commits, 1);
    assert_eq!(stats.set_range_calls, 1);
    assert_eq!(stats.slots_committed, 3);
    assert_eq!(ctx.committed_state().slots(ShaderStage::Pixel, SlotKind::ShaderResource).high_water(), 4);
}

#[test]
fn test_recommit_without_changes_issues_no_calls() {
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 2);
    let mut srb = pipeline.create_shader_resource_binding(false).unwrap();
    bind(&mut srb, ShaderStage::Vertex, "cbFrame", fx.constant_buffer("frame"));
    bind(&mut srb, ShaderStage::Pixel, "g_Sampler", fx.sampler("linear"));
    bind(&mut srb, ShaderStage::Pixel, "g_Output", fx.buffer_uav("output"));

    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    assert_eq!(probe.calls().iter().filter(|c| matches!(c, NativeCall::SetSlots { .. })).count(), 3);

    probe.clear_calls();
    let before = ctx.stats();
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    assert!(probe.calls().is_empty());
    assert_eq!(ctx.stats().set_range_calls, before.set_range_calls);
    assert_eq!(ctx.stats().transitions, before.transitions);
    assert_eq!(ctx.stats().commits, before.commits + 1);
}

#[test]
fn test_samplers_commit_without_usage_state() {
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 1);
    let mut srb = pipeline.create_shader_resource_binding(false).unwrap();
    let sampler = fx.sampler("point");
    bind(&mut srb, ShaderStage::Pixel, "g_Sampler", sampler.clone());

    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);

    assert_eq!(probe.slot(ShaderStage::Pixel, SlotKind::Sampler, 0), Some(sampler.native_handle()));
    assert_eq!(ctx.usage_tracker().tracked_count(), 0);
    assert_eq!(ctx.resource_state(&DeviceObject::from(sampler)), ResourceState::UNDEFINED);
}

#[test]
fn test_shrinking_binding_unbinds_high_water_tail() {
    let fx = Fixture::new();
    let wide = graphics_pipeline(&fx, 4);
    let narrow = graphics_pipeline(&fx, 1);
    let shared = fx.texture_srv("shared");

    let mut wide_srb = wide.create_shader_resource_binding(false).unwrap();
    let views: Vec<DeviceObject> = (0..4).map(|i| fx.texture_srv(&format!("t{}", i)).into()).collect();
    wide_srb.variable_by_name(ShaderStage::Pixel, "g_Textures").unwrap().set_array(&views[1..], 1);
    bind_at(&mut wide_srb, ShaderStage::Pixel, "g_Textures", 0, shared.clone());

    let mut narrow_srb = narrow.create_shader_resource_binding(false).unwrap();
    bind(&mut narrow_srb, ShaderStage::Pixel, "g_Textures", shared.clone());

    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&wide);
    ctx.commit_shader_resources(&wide_srb, ResourceStateTransitionMode::Transition);
    probe.clear_calls();

    ctx.set_pipeline_state(&narrow);
    ctx.commit_shader_resources(&narrow_srb, ResourceStateTransitionMode::Transition);

    // Slot 0 unchanged; slots 1..=3 lie past the new cache but were bound before
    let calls = probe.set_slot_calls(ShaderStage::Pixel, SlotKind::ShaderResource);
    assert_eq!(
        calls,
        vec![NativeCall::SetSlots {
            stage: ShaderStage::Pixel,
            kind: SlotKind::ShaderResource,
            start_slot: 1,
            handles: vec![None, None, None],
        }]
    );
    assert_eq!(ctx.committed_state().slots(ShaderStage::Pixel, SlotKind::ShaderResource).high_water(), 1);
    // Textures that left every slot also leave the role
    if let DeviceObject::TextureView(view) = &views[1] {
        assert!(!ctx.usage_tracker().check_state(view.texture().native_handle(), ResourceState::SHADER_RESOURCE));
    }
    assert!(ctx.usage_tracker().check_state(shared.texture().native_handle(), ResourceState::SHADER_RESOURCE));
}

#[test]
fn test_unbinding_variable_unbinds_slot_on_next_commit() {
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 1);
    let mut srb = pipeline.create_shader_resource_binding(false).unwrap();
    let params = fx.constant_buffer("params");
    bind(&mut srb, ShaderStage::Pixel, "cbParams", params.clone());

    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    assert_eq!(probe.slot(ShaderStage::Pixel, SlotKind::ConstantBuffer, 2), Some(params.native_handle()));

    srb.variable_by_name(ShaderStage::Pixel, "cbParams").unwrap().unbind(0);
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::None);

    assert_eq!(probe.slot(ShaderStage::Pixel, SlotKind::ConstantBuffer, 2), None);
    assert_eq!(ctx.resource_state(&DeviceObject::from(params)), ResourceState::UNDEFINED);
}

// ============================================================================
// HAZARD TESTS
// ============================================================================

#[test]
fn test_constant_buffer_requested_as_uav_is_unbound_first() {
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 1);
    let mut srb = pipeline.create_shader_resource_binding(false).unwrap();
    let shared = fx.rw_buffer("shared");
    bind(&mut srb, ShaderStage::Pixel, "cbParams", shared.clone());

    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    let object = DeviceObject::from(shared.clone());
    assert_eq!(ctx.resource_state(&object), ResourceState::CONSTANT_BUFFER);
    probe.clear_calls();

    ctx.transition_resource_states(&[StateTransition::new(shared.clone(), ResourceState::UNORDERED_ACCESS)]);

    assert_eq!(
        probe.calls(),
        vec![NativeCall::SetSlots {
            stage: ShaderStage::Pixel,
            kind: SlotKind::ConstantBuffer,
            start_slot: 2,
            handles: vec![None],
        }]
    );
    assert_eq!(ctx.resource_state(&object), ResourceState::UNORDERED_ACCESS);
    assert_eq!(ctx.committed_state().slots(ShaderStage::Pixel, SlotKind::ConstantBuffer).handle(2), None);
    assert_eq!(ctx.stats().unbind_calls, 1);
}

#[test]
fn test_compute_commit_unbinds_graphics_read_roles() {
    let fx = Fixture::new();
    let graphics = graphics_pipeline(&fx, 1);
    let compute = compute_pipeline(&fx);
    let shared = fx.rw_buffer("shared");

    let mut graphics_srb = graphics.create_shader_resource_binding(false).unwrap();
    bind(&mut graphics_srb, ShaderStage::Pixel, "cbParams", shared.clone());
    let mut compute_srb = compute.create_shader_resource_binding(false).unwrap();
    bind(&mut compute_srb, ShaderStage::Compute, "g_Target", fx.buffer_view(&shared, BufferViewType::UnorderedAccess));

    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&graphics);
    ctx.commit_shader_resources(&graphics_srb, ResourceStateTransitionMode::Transition);
    probe.clear_calls();

    ctx.set_pipeline_state(&compute);
    ctx.commit_shader_resources(&compute_srb, ResourceStateTransitionMode::Transition);

    let calls = probe.calls();
    let unbind = calls
        .iter()
        .position(|c| c.is_set_slots(ShaderStage::Pixel, SlotKind::ConstantBuffer))
        .expect("constant buffer slot unbound");
    let uav = calls
        .iter()
        .position(|c| c.is_set_slots(ShaderStage::Compute, SlotKind::UnorderedAccess))
        .expect("uav committed");
    assert!(unbind < uav);

    let state = ctx.resource_state(&DeviceObject::from(shared));
    assert_eq!(state, ResourceState::UNORDERED_ACCESS);
    assert!(!state.intersects(ResourceState::READ_ROLES));
}

#[test]
fn test_uav_requested_as_srv_is_unbound_from_every_stage() {
    let fx = Fixture::new();
    let graphics = graphics_pipeline(&fx, 1);
    let compute = compute_pipeline(&fx);
    let shared = fx.rw_buffer("shared");

    let mut graphics_srb = graphics.create_shader_resource_binding(false).unwrap();
    bind(&mut graphics_srb, ShaderStage::Pixel, "g_Output", fx.buffer_view(&shared, BufferViewType::UnorderedAccess));
    let mut compute_srb = compute.create_shader_resource_binding(false).unwrap();
    bind(&mut compute_srb, ShaderStage::Compute, "g_Input", fx.buffer_view(&shared, BufferViewType::ShaderResource));

    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&graphics);
    ctx.commit_shader_resources(&graphics_srb, ResourceStateTransitionMode::Transition);
    assert!(probe.slot(ShaderStage::Pixel, SlotKind::UnorderedAccess, 0).is_some());

    ctx.set_pipeline_state(&compute);
    ctx.commit_shader_resources(&compute_srb, ResourceStateTransitionMode::Transition);

    assert_eq!(probe.slot(ShaderStage::Pixel, SlotKind::UnorderedAccess, 0), None);
    assert!(probe.slot(ShaderStage::Compute, SlotKind::ShaderResource, 0).is_some());
    assert_eq!(ctx.resource_state(&DeviceObject::from(shared)), ResourceState::SHADER_RESOURCE);
}

#[test]
fn test_self_conflicting_transition_is_rejected() {
    let fx = Fixture::new();
    let buffer = fx.rw_buffer("buffer");
    let (mut ctx, probe) = immediate(&fx);

    ctx.transition_resource_states(&[
        StateTransition::new(buffer.clone(), ResourceState::UNORDERED_ACCESS | ResourceState::SHADER_RESOURCE),
        StateTransition::new(fx.sampler("sampler"), ResourceState::SHADER_RESOURCE),
    ]);

    assert_eq!(ctx.resource_state(&DeviceObject::from(buffer)), ResourceState::UNDEFINED);
    assert!(probe.calls().is_empty());
    assert_eq!(ctx.stats().transitions, 0);
}

#[test]
fn test_transition_pass_issues_no_set_calls() {
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 1);
    let mut srb = pipeline.create_shader_resource_binding(false).unwrap();
    let texture = fx.texture_srv("albedo");
    bind(&mut srb, ShaderStage::Pixel, "g_Textures", texture.clone());

    let (mut ctx, probe) = immediate(&fx);
    ctx.transition_shader_resources(&pipeline, &srb);

    assert!(probe.calls().is_empty());
    assert_eq!(ctx.resource_state(&DeviceObject::from(texture)), ResourceState::SHADER_RESOURCE);
}

#[test]
#[serial]
fn test_verify_mode_reports_untransitioned_resources() {
    let logs = capture_logs();
    let fx = Fixture::with_config(Config::diagnostics());
    let pipeline = graphics_pipeline(&fx, 1);
    let mut srb = pipeline.create_shader_resource_binding(true).unwrap();
    bind(&mut srb, ShaderStage::Pixel, "g_Textures", fx.texture_srv("stale"));

    let (mut ctx, _probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Verify);
    assert!(logs.contains(LogSeverity::Error, "Resource 'stale' bound to Pixel shader resource slot 0 is not in"));

    // After the first commit the texture holds its role
    let before = logs.count(LogSeverity::Error, "is not in");
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Verify);
    assert_eq!(logs.count(LogSeverity::Error, "is not in"), before);
}

// ============================================================================
// RENDER TARGET TESTS
// ============================================================================

#[test]
fn test_render_target_and_srv_exclude_each_other() {
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 1);
    let texture = fx.rw_texture("scene");
    let srv = fx.texture_view(&texture, TextureViewType::ShaderResource);
    let rtv = fx.texture_view(&texture, TextureViewType::RenderTarget);
    let mut srb = pipeline.create_shader_resource_binding(false).unwrap();
    bind(&mut srb, ShaderStage::Pixel, "g_Textures", srv.clone());

    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    assert_eq!(probe.slot(ShaderStage::Pixel, SlotKind::ShaderResource, 0), Some(srv.native_handle()));

    ctx.set_render_targets(&[Some(rtv.clone())], None).unwrap();
    assert_eq!(probe.slot(ShaderStage::Pixel, SlotKind::ShaderResource, 0), None);
    assert_eq!(probe.state().render_targets, vec![Some(rtv.native_handle())]);
    assert_eq!(ctx.resource_state(&DeviceObject::from(texture.clone())), ResourceState::RENDER_TARGET);

    // Sampling the texture again takes it off the output merger
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::None);
    assert_eq!(probe.slot(ShaderStage::Pixel, SlotKind::ShaderResource, 0), Some(srv.native_handle()));
    assert!(probe.state().render_targets.is_empty());
    assert_eq!(ctx.resource_state(&DeviceObject::from(texture)), ResourceState::SHADER_RESOURCE);
}

#[test]
fn test_render_target_view_types_are_checked() {
    let fx = Fixture::new();
    let (mut ctx, probe) = immediate(&fx);
    let srv = fx.texture_srv("not_a_target");

    let result = ctx.set_render_targets(&[Some(srv.clone())], None);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
    let result = ctx.set_render_targets(&[], Some(srv));
    assert!(matches!(result, Err(Error::InvalidResource(_))));
    assert!(probe.calls().is_empty());
}

#[test]
fn test_depth_stencil_binding() {
    let fx = Fixture::new();
    let depth = fx
        .device
        .create_texture(TextureDesc::new_2d("depth", 16, 16, BindFlags::DEPTH_STENCIL))
        .unwrap();
    let dsv = fx.texture_view(&depth, TextureViewType::DepthStencil);
    let (mut ctx, probe) = immediate(&fx);

    ctx.set_render_targets(&[], Some(dsv.clone())).unwrap();
    assert_eq!(probe.state().depth_stencil, Some(dsv.native_handle()));
    assert_eq!(ctx.resource_state(&DeviceObject::from(depth.clone())), ResourceState::DEPTH_STENCIL);

    ctx.set_render_targets(&[], None).unwrap();
    assert_eq!(probe.state().depth_stencil, None);
    assert_eq!(ctx.resource_state(&DeviceObject::from(depth)), ResourceState::UNDEFINED);
}

// ============================================================================
// INPUT ASSEMBLER / DRAW TESTS
// ============================================================================

#[test]
fn test_vertex_buffers_commit_at_draw() {
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 1);
    let positions = fx.rw_buffer("positions");
    let normals = fx.rw_buffer("normals");
    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);

    ctx.set_vertex_buffers(0, &[VertexStream::new(positions.clone(), 12), VertexStream::new(normals.clone(), 12)], true)
        .unwrap();
    assert!(probe.state().vertex_buffers.iter().all(Option::is_none));

    ctx.draw(&DrawAttribs::new(3)).unwrap();
    assert_eq!(probe.state().vertex_buffers[0], Some(positions.native_handle()));
    assert_eq!(probe.state().vertex_buffers[1], Some(normals.native_handle()));
    assert_eq!(ctx.resource_state(&DeviceObject::from(positions)), ResourceState::VERTEX_BUFFER);

    // Unchanged streams are not resent
    probe.clear_calls();
    ctx.draw(&DrawAttribs::new(3)).unwrap();
    assert_eq!(probe.calls(), vec![NativeCall::Draw]);
    assert_eq!(ctx.stats().draws, 2);
}

#[test]
fn test_vertex_buffer_bind_flag_is_required() {
    let fx = Fixture::new();
    let (mut ctx, _probe) = immediate(&fx);
    let result = ctx.set_vertex_buffers(0, &[VertexStream::new(fx.constant_buffer("cb"), 16)], false);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
    let result = ctx.set_vertex_buffers(31, &[VertexStream::new(fx.rw_buffer("a"), 4), VertexStream::new(fx.rw_buffer("b"), 4)], false);
    assert!(matches!(result, Err(Error::InvalidResource(_))));
}

#[test]
fn test_indexed_draw_commits_index_buffer() {
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 1);
    let indices = fx.rw_buffer("indices");
    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);

    let result = ctx.draw_indexed(&DrawIndexedAttribs::new(6));
    assert!(matches!(result, Err(Error::UsageError(_))));

    ctx.set_index_buffer(Some(indices.clone()), IndexFormat::U16, 0).unwrap();
    ctx.draw_indexed(&DrawIndexedAttribs::new(6)).unwrap();
    assert_eq!(probe.state().index_buffer, Some(indices.native_handle()));
    assert_eq!(ctx.resource_state(&DeviceObject::from(indices)), ResourceState::INDEX_BUFFER);
    assert_eq!(probe.calls().last(), Some(&NativeCall::DrawIndexed));
}

#[test]
fn test_vertex_buffer_requested_as_uav_is_unbound() {
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 1);
    let buffer = fx.rw_buffer("particles");
    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);
    ctx.set_vertex_buffers(0, &[VertexStream::new(buffer.clone(), 16)], false).unwrap();
    ctx.draw(&DrawAttribs::new(1)).unwrap();

    ctx.transition_resource_states(&[StateTransition::new(buffer.clone(), ResourceState::UNORDERED_ACCESS)]);
    assert_eq!(probe.state().vertex_buffers[0], None);
    assert_eq!(ctx.committed_state().vertex_buffer_high_water(), 0);
    assert_eq!(ctx.resource_state(&DeviceObject::from(buffer)), ResourceState::UNORDERED_ACCESS);
}

#[test]
fn test_draw_and_dispatch_require_matching_pipeline() {
    let fx = Fixture::new();
    let (mut ctx, probe) = immediate(&fx);
    assert!(matches!(ctx.draw(&DrawAttribs::new(3)), Err(Error::UsageError(_))));

    ctx.set_pipeline_state(&compute_pipeline(&fx));
    assert!(matches!(ctx.draw(&DrawAttribs::new(3)), Err(Error::UsageError(_))));
    ctx.dispatch_compute(&DispatchAttribs::new(8, 8, 1)).unwrap();

    ctx.set_pipeline_state(&graphics_pipeline(&fx, 1));
    assert!(matches!(ctx.dispatch_compute(&DispatchAttribs::new(1, 1, 1)), Err(Error::UsageError(_))));
    assert_eq!(ctx.stats().dispatches, 1);
    assert_eq!(probe.calls().iter().filter(|c| **c == NativeCall::Dispatch).count(), 1);
}

#[test]
fn test_set_pipeline_state_only_changes_differing_stages() {
    let fx = Fixture::new();
    let graphics = graphics_pipeline(&fx, 1);
    let (mut ctx, probe) = immediate(&fx);

    ctx.set_pipeline_state(&graphics);
    assert_eq!(probe.calls().len(), 2);
    probe.clear_calls();
    ctx.set_pipeline_state(&graphics);
    assert!(probe.calls().is_empty());

    ctx.set_pipeline_state(&compute_pipeline(&fx));
    let calls = probe.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls.contains(&NativeCall::SetShader { stage: ShaderStage::Vertex, shader: None }));
    assert!(calls.contains(&NativeCall::SetShader { stage: ShaderStage::Pixel, shader: None }));
}

// ============================================================================
// RELEASE / RESET TESTS
// ============================================================================

#[test]
fn test_release_committed_resources_keeps_vertex_buffers() {
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 2);
    let mut srb = pipeline.create_shader_resource_binding(false).unwrap();
    let texture = fx.texture_srv("albedo");
    bind_at(&mut srb, ShaderStage::Pixel, "g_Textures", 1, texture.clone());
    let vertices = fx.rw_buffer("vertices");

    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);
    ctx.set_vertex_buffers(0, &[VertexStream::new(vertices.clone(), 32)], false).unwrap();
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    ctx.draw(&DrawAttribs::new(3)).unwrap();
    probe.clear_calls();

    ctx.release_committed_shader_resources();

    assert_eq!(
        probe.calls(),
        vec![NativeCall::SetSlots {
            stage: ShaderStage::Pixel,
            kind: SlotKind::ShaderResource,
            start_slot: 0,
            handles: vec![None, None],
        }]
    );
    assert_eq!(ctx.committed_state().slots(ShaderStage::Pixel, SlotKind::ShaderResource).high_water(), 0);
    assert_eq!(probe.state().vertex_buffers[0], Some(vertices.native_handle()));
    assert_eq!(ctx.resource_state(&DeviceObject::from(texture)), ResourceState::UNDEFINED);
    assert_eq!(ctx.resource_state(&DeviceObject::from(vertices)), ResourceState::VERTEX_BUFFER);

    // The next commit binds everything again
    probe.clear_calls();
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    assert_eq!(probe.set_slot_calls(ShaderStage::Pixel, SlotKind::ShaderResource).len(), 1);
}

#[test]
fn test_transient_resources_do_not_accumulate_in_tracker() {
    let fx = Fixture::new();
    let pipeline = compute_pipeline(&fx);
    let (mut ctx, _probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);

    for i in 0..1000 {
        let mut srb = pipeline.create_shader_resource_binding(false).unwrap();
        bind(&mut srb, ShaderStage::Compute, "g_Input", fx.buffer_srv(&format!("transient{}", i)));
        ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    }
    // Replaced inputs left the role and the tracker
    assert_eq!(ctx.usage_tracker().tracked_count(), 1);

    ctx.release_committed_shader_resources();
    assert_eq!(ctx.usage_tracker().tracked_count(), 0);
}

#[test]
fn test_mirror_holds_committed_objects_until_release() {
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 1);
    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);

    let albedo = {
        let mut srb = pipeline.create_shader_resource_binding(false).unwrap();
        let view = fx.texture_srv("albedo");
        bind(&mut srb, ShaderStage::Pixel, "g_Textures", view.clone());
        ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
        Arc::downgrade(&view)
    };

    let held = albedo.upgrade().unwrap();
    assert_eq!(probe.slot(ShaderStage::Pixel, SlotKind::ShaderResource, 0), Some(held.native_handle()));
    assert!(fx.device.native_object(held.native_handle()).is_some());
    drop(held);

    ctx.release_committed_shader_resources();
    assert!(albedo.upgrade().is_none());
}

#[test]
fn test_invalidate_state_forgets_everything() {
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 1);
    let mut srb = pipeline.create_shader_resource_binding(false).unwrap();
    bind(&mut srb, ShaderStage::Vertex, "cbFrame", fx.constant_buffer("frame"));

    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    ctx.invalidate_state();

    assert!(ctx.pipeline().is_none());
    assert_eq!(ctx.usage_tracker().tracked_count(), 0);
    assert_eq!(ctx.committed_state().slots(ShaderStage::Vertex, SlotKind::ConstantBuffer).high_water(), 0);
    assert_eq!(probe.calls().last(), Some(&NativeCall::ClearState));
    assert!(ctx.verify_committed_bindings().is_none());
}

#[test]
fn test_finish_and_execute_command_list() {
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 1);
    let mut srb = pipeline.create_shader_resource_binding(false).unwrap();
    bind(&mut srb, ShaderStage::Pixel, "g_Textures", fx.texture_srv("albedo"));

    let (mut recorder, _recorder_probe) = deferred(&fx);
    assert_eq!(recorder.kind(), ContextKind::Deferred);
    recorder.set_pipeline_state(&pipeline);
    recorder.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    recorder.draw(&DrawAttribs::new(3)).unwrap();
    let list = recorder.finish_command_list().unwrap();

    // set shader x2, SRV range, draw
    assert_eq!(list.command_count(), 4);
    assert_eq!(list.retained_object_count(), 1);
    assert_eq!(list.retained_pipeline_count(), 1);
    assert!(recorder.pipeline().is_none());
    assert_eq!(recorder.usage_tracker().tracked_count(), 0);
    assert_eq!(recorder.committed_state().slots(ShaderStage::Pixel, SlotKind::ShaderResource).high_water(), 0);
    assert_eq!(recorder.stats().command_lists, 1);

    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    ctx.execute_command_list(&list).unwrap();

    assert_eq!(probe.calls().last(), Some(&NativeCall::ExecuteCommandList { command_count: 4 }));
    assert!(ctx.pipeline().is_none());
    assert_eq!(ctx.usage_tracker().tracked_count(), 0);
    assert!(ctx.verify_committed_bindings().is_none());

    // The recorder starts over from the unbound baseline
    recorder.set_pipeline_state(&pipeline);
    recorder.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    assert_eq!(recorder.committed_state().slots(ShaderStage::Pixel, SlotKind::ShaderResource).high_water(), 1);
}

#[test]
fn test_command_lists_respect_context_kind() {
    let fx = Fixture::new();
    let (mut ctx, _probe) = immediate(&fx);
    assert!(matches!(ctx.finish_command_list(), Err(Error::UsageError(_))));

    let (mut recorder, _recorder_probe) = deferred(&fx);
    let list = recorder.finish_command_list().unwrap();
    assert_eq!(list.command_count(), 0);
    assert!(matches!(recorder.execute_command_list(&list), Err(Error::UsageError(_))));
    ctx.execute_command_list(&list).unwrap();
}

// ============================================================================
// DIAGNOSTIC TESTS
// ============================================================================

#[test]
#[serial]
fn test_verify_committed_bindings_reports_first_divergent_slot() {
    let logs = capture_logs();
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 4);
    let mut srb = pipeline.create_shader_resource_binding(false).unwrap();
    bind_at(&mut srb, ShaderStage::Pixel, "g_Textures", 2, fx.texture_srv("albedo"));

    let (mut ctx, probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    assert!(ctx.verify_committed_bindings().is_none());

    // Someone else rebinds slot 2 behind the context's back
    let intruder = fx.texture_srv("intruder").native_handle();
    let expected = probe.slot(ShaderStage::Pixel, SlotKind::ShaderResource, 2);
    probe.state().slots[ShaderStage::Pixel.index()][SlotKind::ShaderResource.index()][2] = Some(intruder);

    let mismatch = ctx.verify_committed_bindings().unwrap();
    assert_eq!(mismatch.stage, ShaderStage::Pixel);
    assert_eq!(mismatch.kind, SlotKind::ShaderResource);
    assert_eq!(mismatch.slot, 2);
    assert_eq!(mismatch.expected, expected);
    assert_eq!(mismatch.actual, Some(intruder));
    assert!(logs.contains(LogSeverity::Error, "Pixel shader resource slot 2"));
}

#[test]
#[serial]
fn test_commit_without_pipeline_or_with_foreign_binding_is_a_no_op() {
    let logs = capture_logs();
    let fx = Fixture::new();
    let pipeline = graphics_pipeline(&fx, 1);
    let other = graphics_pipeline(&fx, 3);
    let mut srb = pipeline.create_shader_resource_binding(false).unwrap();
    bind(&mut srb, ShaderStage::Vertex, "cbFrame", fx.constant_buffer("frame"));

    let (mut ctx, probe) = immediate(&fx);
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    assert!(logs.contains(LogSeverity::Error, "No pipeline state is bound"));

    ctx.set_pipeline_state(&other);
    probe.clear_calls();
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::Transition);
    assert!(logs.contains(LogSeverity::Error, "is not compatible with the bound pipeline 'graphics_3'"));
    assert!(probe.calls().is_empty());
    assert_eq!(ctx.stats().commits, 0);
}

#[test]
#[serial]
fn test_commit_warns_about_unbound_static_resources() {
    let logs = capture_logs();
    let fx = Fixture::with_config(Config::diagnostics());
    let pipeline = graphics_pipeline(&fx, 1);
    let srb = pipeline.create_shader_resource_binding(false).unwrap();

    let (mut ctx, _probe) = immediate(&fx);
    ctx.set_pipeline_state(&pipeline);
    ctx.commit_shader_resources(&srb, ResourceStateTransitionMode::None);

    assert!(logs.contains(LogSeverity::Warn, "Static resources have not been bound"));
    assert!(logs.contains(LogSeverity::Warn, "with unbound variables"));
    assert_eq!(ctx.stats().commits, 1);
}
